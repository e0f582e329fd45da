use std::path::{Path, PathBuf};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::fabric::common::{Error, Result};
use crate::fabric::lb::directory::BackendDirectory;

/// Watches the directory containing the backend discovery file and posts a
/// reload request whenever it's modified. Multiple events that land while a
/// reload is already in progress are coalesced into exactly one additional
/// reload (spec §4.9): the request channel has capacity 1, and a full
/// channel means a reload is already queued, so the extra notification is
/// simply dropped.
///
/// Runs until the channel closes (i.e. forever, since no sender is ever
/// dropped while this function holds `_watcher` alive) or the process exits.
pub async fn watch_backend_file(directory: BackendDirectory, servers_file: &str) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<()>(1);

    let file_path = PathBuf::from(servers_file);
    let watch_dir = file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file_name = file_path.file_name().map(|s| s.to_os_string());

    let mut _watcher: RecommendedWatcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let Ok(event) = res else { return };
        let matches = event
            .paths
            .iter()
            .any(|p| p.file_name() == file_name.as_deref());
        if matches {
            // try_send: a full channel means a reload is already pending, so
            // this event is coalesced with it rather than queued again.
            let _ = tx.try_send(());
        }
    })
    .map_err(|e| Error::new(e.to_string()))?;

    _watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .map_err(|e| Error::new(e.to_string()))?;

    info!(dir = %watch_dir.display(), "watching backend discovery file for changes");

    while rx.recv().await.is_some() {
        if let Err(e) = directory.reload().await {
            warn!(error = %e, "reload triggered by file change failed, retaining previous backend list");
        }
    }

    Ok(())
}
