use tokio::net::TcpListener;
use tracing::info;

use crate::fabric::common::Result;
use crate::fabric::lb::config::LbSettings;
use crate::fabric::lb::directory::BackendDirectory;
use crate::fabric::lb::sessions::ClientSessions;
use crate::fabric::lb::{frontend, watcher};

/// run wires together the three long-running LB components described in
/// spec §4: an initial backend discovery pass, the filesystem watcher that
/// triggers reloads, and the client front-end accept loop. It returns only
/// on a fatal setup error (e.g. the listen address can't be bound); the
/// accept loop and watcher otherwise run until the process is killed.
pub async fn run(settings: LbSettings) -> Result<()> {
    let sessions = ClientSessions::new();
    let directory = BackendDirectory::new(sessions.clone(), settings.clone());

    directory.ensure_file_exists().await?;
    if let Err(e) = directory.reload().await {
        tracing::warn!(error = %e, "initial backend discovery reload failed, starting with no backends");
    }

    let watch_directory = directory.clone();
    let servers_file = settings.servers_file.clone();
    tokio::spawn(async move {
        if let Err(e) = watcher::watch_backend_file(watch_directory, &servers_file).await {
            tracing::error!(error = %e, "backend discovery file watcher exited");
        }
    });

    let listener = TcpListener::bind(settings.listen_address()).await?;
    info!(addr = %settings.listen_address(), "load balancer listening for clients");

    frontend::run(listener, sessions, directory, settings).await;
    Ok(())
}
