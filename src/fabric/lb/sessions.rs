use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::RwLock;
use tracing::warn;

/// A single client's write half, serialized behind its own mutex so the
/// front-end's reader task and the backend reader task that delivers pushes
/// back to this client never interleave writes on the same socket.
type ClientWriter = Arc<AsyncMutex<OwnedWriteHalf>>;

/// `ClientSessions` is the LB's map from minted `client_id` to the client's
/// live write half. Populated at accept, removed when the client's reader
/// task exits (EOF, error, or no-backend-available).
#[derive(Default, Clone)]
pub struct ClientSessions {
    inner: Arc<RwLock<HashMap<String, ClientWriter>>>,
}

impl ClientSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, client_id: String, writer: OwnedWriteHalf) {
        let mut map = self.inner.write().await;
        map.insert(client_id, Arc::new(AsyncMutex::new(writer)));
    }

    pub async fn remove(&self, client_id: &str) {
        self.inner.write().await.remove(client_id);
    }

    async fn get(&self, client_id: &str) -> Option<ClientWriter> {
        self.inner.read().await.get(client_id).cloned()
    }

    pub async fn contains(&self, client_id: &str) -> bool {
        self.inner.read().await.contains_key(client_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// deliver writes `payload` to `client_id`'s socket and flushes. If the
    /// client is no longer connected the payload is dropped and a warning is
    /// logged — per spec this must never close the backend connection.
    pub async fn deliver(&self, client_id: &str, payload: &[u8]) {
        let Some(writer) = self.get(client_id).await else {
            warn!(client_id, "dropping payload for unknown or disconnected client");
            return;
        };

        let mut guard = writer.lock().await;
        if let Err(e) = guard.write_all(payload).await {
            warn!(client_id, error = %e, "error writing to client, closing session");
            drop(guard);
            self.remove(client_id).await;
            return;
        }
        if let Err(e) = guard.flush().await {
            warn!(client_id, error = %e, "error flushing to client, closing session");
            drop(guard);
            self.remove(client_id).await;
        }
    }
}
