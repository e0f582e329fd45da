use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, info_span, warn, Instrument};

use crate::fabric::common::Result;
use crate::fabric::server::collaborators::{AuthStore, RoomStore};
use crate::fabric::server::config::ServerSettings;
use crate::fabric::server::directory_store::ClientDirectory;
use crate::fabric::server::framer_loop;

/// run accepts LB peer connections and spawns an independent Server Framer
/// Loop per connection (spec §4.6: "the server may hold many concurrent LB
/// connections ... each runs its own independent loop").
pub async fn run(
    settings: ServerSettings,
    directory: ClientDirectory,
    auth: Arc<dyn AuthStore>,
    rooms: Arc<dyn RoomStore>,
) -> Result<()> {
    let listener = TcpListener::bind(settings.listen_address()).await?;
    info!(addr = %settings.listen_address(), "application server listening for LB connections");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "accept failed on LB-facing listener");
                continue;
            }
        };
        stream.set_nodelay(true).ok();

        let directory = directory.clone();
        let auth = auth.clone();
        let rooms = rooms.clone();
        let max_frame_len = settings.max_frame_len;

        let span = info_span!("lb_connection", %peer);
        tokio::spawn(framer_loop::run(stream, directory, auth, rooms, max_frame_len).instrument(span));
    }
}
