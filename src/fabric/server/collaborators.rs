use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::fabric::common::{Error, Result};
use crate::fabric::server::schema::Participant;

/// Authenticates credentials and distinguishes teacher/student roles.
/// Out of scope (spec §1): the business logic behind this predicate — and
/// the backing user table — belongs to a collaborator system, not this
/// fabric. Handlers only ever see this trait.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str, role: &str) -> Result<bool>;
}

/// Room/participant CRUD. Out of scope (spec §1): room creation, membership,
/// and teardown are a collaborator's business logic; the dispatcher only
/// needs existence checks and participant listing to implement `join_room`,
/// `refresh`, `notify`, and `logout`.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn create_room(&self, room_id: &str, teacher: &str) -> Result<bool>;
    async fn room_exists(&self, room_id: &str) -> Result<bool>;
    async fn join_room(&self, room_id: &str, username: &str, student_name: &str, mssv: &str) -> Result<bool>;
    async fn delete_room(&self, room_id: &str) -> Result<()>;
    async fn room_participants(&self, room_id: &str) -> Result<Vec<Participant>>;
}

struct SeedUser {
    password: &'static str,
    role: &'static str,
}

/// A minimal in-process `AuthStore`, seeded the way
/// `ClassroomDatabase.__init__` seeds its in-memory user table. Exists so
/// `appserver` runs out of the box; a real deployment swaps this for a
/// collaborator backed by the institution's actual user directory.
pub struct InMemoryAuthStore {
    users: HashMap<&'static str, SeedUser>,
}

impl Default for InMemoryAuthStore {
    fn default() -> Self {
        let mut users = HashMap::new();
        users.insert("teacher1", SeedUser { password: "teach123", role: "teacher" });
        users.insert("student1", SeedUser { password: "stu456", role: "student" });
        InMemoryAuthStore { users }
    }
}

#[async_trait]
impl AuthStore for InMemoryAuthStore {
    async fn authenticate(&self, username: &str, password: &str, role: &str) -> Result<bool> {
        Ok(self.users.get(username).is_some_and(|u| u.password == password && u.role == role))
    }
}

struct Room {
    teacher: String,
    participants: Vec<Participant>,
}

/// A minimal in-process `RoomStore` backed by a mutex-guarded map. Rooms do
/// not survive a restart; a real deployment swaps this for a collaborator
/// backed by the shared room database.
#[derive(Default)]
pub struct InMemoryRoomStore {
    rooms: Mutex<HashMap<String, Room>>,
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn create_room(&self, room_id: &str, teacher: &str) -> Result<bool> {
        let mut rooms = self.rooms.lock()?;
        if rooms.contains_key(room_id) {
            return Ok(false);
        }
        rooms.insert(room_id.to_string(), Room { teacher: teacher.to_string(), participants: Vec::new() });
        Ok(true)
    }

    async fn room_exists(&self, room_id: &str) -> Result<bool> {
        Ok(self.rooms.lock()?.contains_key(room_id))
    }

    async fn join_room(&self, room_id: &str, username: &str, student_name: &str, mssv: &str) -> Result<bool> {
        let mut rooms = self.rooms.lock()?;
        let Some(room) = rooms.get_mut(room_id) else { return Ok(false) };
        if room.participants.iter().any(|p| p.username == username) {
            return Ok(false);
        }
        room.participants.push(Participant {
            username: username.to_string(),
            student_name: student_name.to_string(),
            mssv: mssv.to_string(),
        });
        Ok(true)
    }

    async fn delete_room(&self, room_id: &str) -> Result<()> {
        self.rooms.lock()?.remove(room_id);
        Ok(())
    }

    async fn room_participants(&self, room_id: &str) -> Result<Vec<Participant>> {
        let rooms = self.rooms.lock()?;
        match rooms.get(room_id) {
            Some(room) => Ok(room.participants.clone()),
            None => Err(Error::new(format!("room '{room_id}' not found"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_auth_accepts_seeded_credentials() {
        let auth = InMemoryAuthStore::default();
        assert!(auth.authenticate("teacher1", "teach123", "teacher").await.unwrap());
        assert!(!auth.authenticate("teacher1", "wrong", "teacher").await.unwrap());
        assert!(!auth.authenticate("nobody", "x", "student").await.unwrap());
    }

    #[tokio::test]
    async fn in_memory_room_store_round_trips_create_join_list() {
        let rooms = InMemoryRoomStore::default();
        assert!(rooms.create_room("r1", "teacher1").await.unwrap());
        assert!(!rooms.create_room("r1", "teacher1").await.unwrap());
        assert!(rooms.join_room("r1", "stu1", "Stu One", "mssv1").await.unwrap());
        assert!(!rooms.join_room("r1", "stu1", "Stu One", "mssv1").await.unwrap());

        let participants = rooms.room_participants("r1").await.unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].username, "stu1");
    }
}
