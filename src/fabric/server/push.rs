use std::sync::Arc;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex as AsyncMutex;

use crate::fabric::common::Result;
use crate::fabric::proto;

/// The push-sender closure bound to one LB connection (spec §4.7): handlers
/// call `send` to address an envelope to an arbitrary client_id over the
/// same LB connection that delivered the triggering request. Routing that
/// envelope to the right client socket is the LB's job, via its
/// `ClientSessions` table — this side only needs to get the envelope onto
/// the wire.
#[derive(Clone)]
pub struct Push {
    writer: Arc<AsyncMutex<OwnedWriteHalf>>,
    max_frame_len: u32,
}

impl Push {
    pub fn new(writer: Arc<AsyncMutex<OwnedWriteHalf>>, max_frame_len: u32) -> Self {
        Push { writer, max_frame_len }
    }

    pub async fn send(&self, target_client_id: &str, payload: &impl Serialize) -> Result<()> {
        let body = serde_json::to_vec(payload)?;
        let envelope = proto::encode(target_client_id, &body, self.max_frame_len)?;
        let mut w = self.writer.lock().await;
        w.write_all(&envelope).await?;
        w.flush().await?;
        Ok(())
    }
}
