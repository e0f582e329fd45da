use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::fabric::lb::config::LbSettings;
use crate::fabric::lb::directory::BackendDirectory;
use crate::fabric::lb::sessions::ClientSessions;

/// run accepts client connections until `listener` is dropped or returns an
/// error; each accepted socket gets its own client_id and reader task (spec
/// §4.2).
pub async fn run(listener: TcpListener, sessions: ClientSessions, directory: BackendDirectory, settings: LbSettings) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "accept failed on client front-end listener");
                continue;
            }
        };
        stream.set_nodelay(true).ok();

        let client_id = Uuid::new_v4().to_string();
        let sessions = sessions.clone();
        let directory = directory.clone();
        let settings = settings.clone();

        let span = info_span!("client", %client_id, %peer);
        tokio::spawn(serve_client(stream, client_id, sessions, directory, settings).instrument(span));
    }
}

/// serve_client owns one client connection end to end: it registers the
/// write half in `ClientSessions` before reading anything (so a push
/// targeting this client_id can never race ahead of registration), then
/// relays everything the client sends to whichever backend `directory`
/// currently selects, tagging each envelope with this connection's
/// client_id (spec §4.2-§4.3). The backend's own reader task (see
/// `connector::reader_loop`) delivers pushes back to this client directly
/// through `ClientSessions`, so this task only ever reads client → backend.
async fn serve_client(
    stream: TcpStream,
    client_id: String,
    sessions: ClientSessions,
    directory: BackendDirectory,
    settings: LbSettings,
) {
    let (read_half, write_half) = stream.into_split();

    if sessions.contains(&client_id).await {
        // uuid v4 collision: vanishingly unlikely, but a duplicate session
        // would silently steal another client's writer. Refuse the
        // connection rather than risk it.
        warn!(client_id, "minted client_id already in use, dropping connection");
        return;
    }
    sessions.insert(client_id.clone(), write_half).await;
    info!(client_id, "client connected");

    client_read_loop(read_half, &client_id, &directory, &settings).await;

    sessions.remove(&client_id).await;
    info!(client_id, "client disconnected");
}

async fn client_read_loop(
    mut read_half: OwnedReadHalf,
    client_id: &str,
    directory: &BackendDirectory,
    settings: &LbSettings,
) {
    let mut buf = vec![0u8; settings.client_read_chunk];
    loop {
        let n = match read_half.read(&mut buf).await {
            Ok(0) => {
                info!(client_id, "client closed connection");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(client_id, error = %e, "error reading from client");
                return;
            }
        };

        let Some(backend) = directory.select().await else {
            warn!(client_id, "no healthy backend available, closing client");
            return;
        };

        if let Err(e) = backend.send(client_id, &buf[..n], settings.max_frame_len).await {
            warn!(client_id, index = backend.index, error = %e, "failed to forward payload to backend");
        }
    }
}
