use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::fabric::proto;
use crate::fabric::server::collaborators::{AuthStore, RoomStore};
use crate::fabric::server::directory_store::ClientDirectory;
use crate::fabric::server::dispatcher;
use crate::fabric::server::handlers::HandlerContext;
use crate::fabric::server::push::Push;

/// run implements the Server Framer Loop (spec §4.6) for a single LB
/// connection: decode an envelope, dispatch it, write the response back
/// addressed to the same client_id, repeat. On EOF, a framing error, or
/// cancellation, the last-seen client_id is unregistered from the directory
/// (spec §4.6 cleanup, §4.8).
pub async fn run(
    stream: TcpStream,
    directory: ClientDirectory,
    auth: Arc<dyn AuthStore>,
    rooms: Arc<dyn RoomStore>,
    max_frame_len: u32,
) {
    let (mut read_half, write_half) = stream.into_split();
    let writer = Arc::new(AsyncMutex::new(write_half));
    let push = Push::new(writer.clone(), max_frame_len);

    let mut last_seen_client_id: Option<String> = None;

    loop {
        let envelope = match proto::decode(&mut read_half, max_frame_len).await {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "LB connection framer error or EOF, closing");
                break;
            }
        };

        last_seen_client_id = Some(envelope.client_id.clone());

        let ctx = HandlerContext {
            directory: directory.clone(),
            push: push.clone(),
            auth: auth.clone(),
            rooms: rooms.clone(),
            caller_client_id: envelope.client_id.clone(),
        };

        let response = dispatcher::dispatch(&ctx, &envelope.payload).await;
        let body = match serde_json::to_vec(&response) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "failed to encode dispatcher response");
                continue;
            }
        };

        let out = match proto::encode(&envelope.client_id, &body, max_frame_len) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, client_id = %envelope.client_id, "response too large to encode");
                continue;
            }
        };

        let mut w = writer.lock().await;
        if let Err(e) = w.write_all(&out).await {
            warn!(error = %e, "failed writing response to LB connection");
            drop(w);
            break;
        }
        if let Err(e) = w.flush().await {
            warn!(error = %e, "failed flushing response to LB connection");
            break;
        }
    }

    if let Some(client_id) = last_seen_client_id {
        if let Err(e) = directory.unregister_by_client_id(&client_id) {
            warn!(error = %e, client_id, "directory cleanup failed on connection close");
        }
    }
    info!("LB connection closed");
}
