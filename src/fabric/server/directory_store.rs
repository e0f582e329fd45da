use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::fabric::common::{Error, Result};

/// Key: username. Value: JSON-encoded `UserEntry` (client_id + last_seen).
const USERNAMES: TableDefinition<&str, &[u8]> = TableDefinition::new("directory_usernames");
/// Key: client_id. Value: username. The reverse index kept consistent with
/// `USERNAMES` inside every transaction.
const CLIENT_IDS: TableDefinition<&str, &str> = TableDefinition::new("directory_client_ids");

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserEntry {
    client_id: String,
    last_seen: u64,
}

/// `ClientDirectory` is the transactional `username ↔ client_id` store
/// described in spec §4.8, backed by `redb`. Safe to clone and share across
/// tasks; `redb::Database` serializes writers internally and readers never
/// block writers (spec §4.8's "safe under concurrent access").
///
/// The store is process-local: spec §4.8 calls for "a transactional store
/// shared across server instances", which a single-file `redb::Database`
/// cannot provide across multiple OS processes. See DESIGN.md for the
/// tradeoff and how a networked store would replace this.
#[derive(Clone)]
pub struct ClientDirectory {
    db: Arc<Database>,
}

impl ClientDirectory {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path.as_ref()).map_err(Error::storage)?;

        let txn = db.begin_write().map_err(Error::storage)?;
        {
            let _ = txn.open_table(USERNAMES).map_err(Error::storage)?;
            let _ = txn.open_table(CLIENT_IDS).map_err(Error::storage)?;
        }
        txn.commit().map_err(Error::storage)?;

        Ok(ClientDirectory { db: Arc::new(db) })
    }

    /// register upserts `(username, client_id)`; in the same transaction it
    /// deletes any prior row whose `client_id` matches but whose username
    /// differs (spec §3 invariant, §8 scenario 6).
    pub fn register(&self, username: &str, client_id: &str) -> Result<()> {
        let now = now_secs();
        let txn = self.db.begin_write().map_err(Error::storage)?;
        {
            let mut usernames = txn.open_table(USERNAMES).map_err(Error::storage)?;
            let mut client_ids = txn.open_table(CLIENT_IDS).map_err(Error::storage)?;

            if let Some(existing) = client_ids.get(client_id).map_err(Error::storage)? {
                let existing_username = existing.value().to_string();
                if existing_username != username {
                    usernames.remove(existing_username.as_str()).map_err(Error::storage)?;
                }
            }

            let entry = UserEntry { client_id: client_id.to_string(), last_seen: now };
            let encoded = serde_json::to_vec(&entry)?;
            usernames.insert(username, encoded.as_slice()).map_err(Error::storage)?;
            client_ids.insert(client_id, username).map_err(Error::storage)?;
        }
        txn.commit().map_err(Error::storage)?;
        Ok(())
    }

    /// unregister_by_username deletes the row keyed by `username`, if any.
    /// Idempotent.
    pub fn unregister_by_username(&self, username: &str) -> Result<()> {
        let txn = self.db.begin_write().map_err(Error::storage)?;
        {
            let mut usernames = txn.open_table(USERNAMES).map_err(Error::storage)?;
            let mut client_ids = txn.open_table(CLIENT_IDS).map_err(Error::storage)?;

            if let Some(raw) = usernames.remove(username).map_err(Error::storage)? {
                let entry: UserEntry = serde_json::from_slice(raw.value())?;
                // Only remove the reverse-index row if it still points back
                // at this username: a later register(other_user, same_cid)
                // may already have overwritten it.
                if let Some(back) = client_ids.get(entry.client_id.as_str()).map_err(Error::storage)? {
                    if back.value() == username {
                        drop(back);
                        client_ids.remove(entry.client_id.as_str()).map_err(Error::storage)?;
                    }
                }
            }
        }
        txn.commit().map_err(Error::storage)?;
        Ok(())
    }

    /// unregister_by_client_id deletes the row keyed (via the reverse index)
    /// by `client_id`, if any. Idempotent.
    pub fn unregister_by_client_id(&self, client_id: &str) -> Result<()> {
        let txn = self.db.begin_write().map_err(Error::storage)?;
        {
            let mut usernames = txn.open_table(USERNAMES).map_err(Error::storage)?;
            let mut client_ids = txn.open_table(CLIENT_IDS).map_err(Error::storage)?;

            if let Some(username) = client_ids.remove(client_id).map_err(Error::storage)? {
                let username = username.value().to_string();
                if let Some(raw) = usernames.get(username.as_str()).map_err(Error::storage)? {
                    let entry: UserEntry = serde_json::from_slice(raw.value())?;
                    if entry.client_id == client_id {
                        drop(raw);
                        usernames.remove(username.as_str()).map_err(Error::storage)?;
                    }
                }
            }
        }
        txn.commit().map_err(Error::storage)?;
        Ok(())
    }

    pub fn lookup_client_id(&self, username: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read().map_err(Error::storage)?;
        let usernames = txn.open_table(USERNAMES).map_err(Error::storage)?;
        match usernames.get(username).map_err(Error::storage)? {
            Some(raw) => {
                let entry: UserEntry = serde_json::from_slice(raw.value())?;
                Ok(Some(entry.client_id))
            }
            None => Ok(None),
        }
    }

    pub fn lookup_username(&self, client_id: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read().map_err(Error::storage)?;
        let client_ids = txn.open_table(CLIENT_IDS).map_err(Error::storage)?;
        Ok(client_ids.get(client_id).map_err(Error::storage)?.map(|v| v.value().to_string()))
    }
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn register_then_lookup_both_directions() {
        let dir = tempdir().unwrap();
        let store = ClientDirectory::open(dir.path().join("d.redb")).unwrap();

        store.register("stu1", "c1").unwrap();
        assert_eq!(store.lookup_client_id("stu1").unwrap().as_deref(), Some("c1"));
        assert_eq!(store.lookup_username("c1").unwrap().as_deref(), Some("stu1"));
    }

    #[test]
    fn registering_same_client_id_evicts_prior_username() {
        let dir = tempdir().unwrap();
        let store = ClientDirectory::open(dir.path().join("d.redb")).unwrap();

        store.register("u1", "c1").unwrap();
        store.register("u2", "c1").unwrap();

        assert_eq!(store.lookup_username("c1").unwrap().as_deref(), Some("u2"));
        assert_eq!(store.lookup_client_id("u1").unwrap(), None);
        assert_eq!(store.lookup_client_id("u2").unwrap().as_deref(), Some("c1"));
    }

    #[test]
    fn unregister_by_username_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = ClientDirectory::open(dir.path().join("d.redb")).unwrap();

        store.register("stu1", "c1").unwrap();
        store.unregister_by_username("stu1").unwrap();
        store.unregister_by_username("stu1").unwrap();

        assert_eq!(store.lookup_client_id("stu1").unwrap(), None);
        assert_eq!(store.lookup_username("c1").unwrap(), None);
    }

    #[test]
    fn unregister_by_client_id_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = ClientDirectory::open(dir.path().join("d.redb")).unwrap();

        store.register("stu1", "c1").unwrap();
        store.unregister_by_client_id("c1").unwrap();
        store.unregister_by_client_id("c1").unwrap();

        assert_eq!(store.lookup_username("c1").unwrap(), None);
        assert_eq!(store.lookup_client_id("stu1").unwrap(), None);
    }

    #[test]
    fn unregister_by_client_id_does_not_clobber_a_newer_registration() {
        let dir = tempdir().unwrap();
        let store = ClientDirectory::open(dir.path().join("d.redb")).unwrap();

        store.register("u1", "c1").unwrap();
        store.register("u1", "c2").unwrap(); // u1 reconnects with a new client_id
        store.unregister_by_client_id("c1").unwrap(); // stale cleanup for the old connection

        assert_eq!(store.lookup_client_id("u1").unwrap().as_deref(), Some("c2"));
    }
}
