use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info_span, warn, Instrument};

use crate::fabric::common::Result;
use crate::fabric::lb::backend::BackendAddr;
use crate::fabric::lb::directory::BackendDirectory;
use crate::fabric::lb::sessions::ClientSessions;
use crate::fabric::proto;

/// `BackendConn` is the writer half of one persistent LB↔backend connection.
/// Writes are serialized with an internal mutex so concurrent client
/// front-end tasks never interleave two envelopes on the wire (spec §4.4).
pub struct BackendConn {
    pub index: usize,
    pub addr: BackendAddr,
    writer: AsyncMutex<OwnedWriteHalf>,
}

impl BackendConn {
    pub async fn send(&self, client_id: &str, payload: &[u8], max_len: u32) -> Result<()> {
        let bytes = proto::encode(client_id, payload, max_len)?;
        let mut w = self.writer.lock().await;
        w.write_all(&bytes).await?;
        w.flush().await?;
        Ok(())
    }
}

/// Bundles the writer-owning `BackendConn` with the handle to its reader
/// task, so the directory can cancel the reader when the connection is torn
/// down (health loss, removal from `servers.json`, or reload).
pub struct ConnectedBackend {
    pub conn: Arc<BackendConn>,
    pub reader_task: JoinHandle<()>,
}

/// open establishes a new backend connection with a connect deadline, then
/// spawns its reader task. On connect failure, returns `Err` — the caller
/// (the directory's reload loop) demotes the index to unhealthy for this
/// cycle rather than retrying immediately.
pub async fn open(
    addr: BackendAddr,
    index: usize,
    deadline: Duration,
    sessions: ClientSessions,
    max_frame_len: u32,
    directory: BackendDirectory,
) -> Result<ConnectedBackend> {
    let stream = timeout(deadline, TcpStream::connect(addr.socket_addr_string())).await??;
    stream.set_nodelay(true).ok();
    let (read_half, write_half) = stream.into_split();

    let conn = Arc::new(BackendConn {
        index,
        addr: addr.clone(),
        writer: AsyncMutex::new(write_half),
    });

    let span = info_span!("backend_reader", index, %addr);
    let reader_task = tokio::spawn(
        reader_loop(read_half, index, addr, sessions, max_frame_len, directory).instrument(span),
    );

    Ok(ConnectedBackend { conn, reader_task })
}

/// reader_loop decodes envelopes from the backend and forwards each payload
/// to the client named by its embedded client_id (spec §4.4). On any
/// framing or I/O error it asks the directory to tear this backend down and
/// exits; it never closes the backend merely because a target client is
/// gone (that payload is just dropped, inside `ClientSessions::deliver`).
async fn reader_loop(
    mut read_half: OwnedReadHalf,
    index: usize,
    addr: BackendAddr,
    sessions: ClientSessions,
    max_frame_len: u32,
    directory: BackendDirectory,
) {
    loop {
        match proto::decode(&mut read_half, max_frame_len).await {
            Ok(envelope) => {
                sessions.deliver(&envelope.client_id, &envelope.payload).await;
            }
            Err(e) => {
                warn!(index, %addr, error = %e, "backend connection closed, demoting");
                break;
            }
        }
    }
    directory.close_backend(index).await;
}
