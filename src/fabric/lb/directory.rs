use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, info_span, warn};

use crate::fabric::common::{Error, Result};
use crate::fabric::lb::backend::{Backend, BackendAddr, Health};
use crate::fabric::lb::config::LbSettings;
use crate::fabric::lb::connector::{self, BackendConn, ConnectedBackend};
use crate::fabric::lb::prober;
use crate::fabric::lb::sessions::ClientSessions;

struct DirectoryState {
    backends: Vec<Backend>,
    connections: HashMap<usize, ConnectedBackend>,
    /// The cyclic round-robin order: healthy ∩ connected indices, sorted.
    cursor: Vec<usize>,
    cursor_pos: usize,
}

impl DirectoryState {
    fn empty() -> Self {
        DirectoryState {
            backends: Vec::new(),
            connections: HashMap::new(),
            cursor: Vec::new(),
            cursor_pos: 0,
        }
    }

    fn rebuild_cursor(&mut self) {
        let mut indices: Vec<usize> = self
            .backends
            .iter()
            .filter(|b| b.health.is_healthy() && self.connections.contains_key(&b.index))
            .map(|b| b.index)
            .collect();
        indices.sort_unstable();
        self.cursor = indices;
        self.cursor_pos = 0;
    }
}

/// `BackendDirectory` is the LB's single source of truth for which backends
/// exist, which are healthy, and which have a live connection. All mutation
/// happens under one exclusive lock (spec §4.3/§5); this is the explicit,
/// non-singleton replacement for the original source's module-level globals
/// (spec §9).
#[derive(Clone)]
pub struct BackendDirectory {
    state: Arc<AsyncMutex<DirectoryState>>,
    sessions: ClientSessions,
    settings: LbSettings,
}

impl BackendDirectory {
    pub fn new(sessions: ClientSessions, settings: LbSettings) -> Self {
        BackendDirectory {
            state: Arc::new(AsyncMutex::new(DirectoryState::empty())),
            sessions,
            settings,
        }
    }

    /// Creates an empty `servers.json` if the configured file doesn't exist
    /// yet, matching both Python load balancer variants in the original
    /// source.
    pub async fn ensure_file_exists(&self) -> Result<()> {
        let path = Path::new(&self.settings.servers_file);
        if !path.exists() {
            tokio::fs::write(path, b"[]").await?;
            info!(path = %path.display(), "created empty backend discovery file");
        }
        Ok(())
    }

    /// reload runs one parse → probe → diff-and-apply cycle (spec §4.3).
    /// On a parse failure the prior backend list is retained unchanged and
    /// the error is returned to the caller to log.
    pub async fn reload(&self) -> Result<()> {
        let _span = info_span!("reload").entered();

        let addrs = parse_servers_file(&self.settings.servers_file).await?;
        let deadline = Duration::from_secs_f64(self.settings.health_check_timeout_secs);

        let mut probes = Vec::with_capacity(addrs.len());
        for addr in &addrs {
            let addr = addr.clone();
            let deadline = deadline;
            probes.push(tokio::spawn(async move {
                let ok = prober::probe(&addr, deadline).await;
                (addr, ok)
            }));
        }
        let mut new_backends = Vec::with_capacity(addrs.len());
        for (index, probe) in probes.into_iter().enumerate() {
            let (addr, ok) = probe.await.map_err(|e| Error::new(e.to_string()))?;
            let health = if ok { Health::Healthy } else { Health::Unhealthy };
            if ok {
                info!(index, %addr, "backend PASSED health check");
            } else {
                warn!(index, %addr, "backend FAILED health check");
            }
            new_backends.push(Backend { index, addr, health });
        }

        let mut state = self.state.lock().await;

        // Close connections whose index is gone or now unhealthy.
        let keep: Vec<usize> = new_backends
            .iter()
            .filter(|b| b.health.is_healthy())
            .map(|b| b.index)
            .collect();
        let to_close: Vec<usize> = state
            .connections
            .keys()
            .copied()
            .filter(|i| !keep.contains(i))
            .collect();
        for index in to_close {
            if let Some(connected) = state.connections.remove(&index) {
                connected.reader_task.abort();
                info!(index, "closed backend connection (unhealthy or removed)");
            }
        }

        // Open connections for newly healthy, unconnected indices.
        let connect_deadline = deadline * 2;
        for backend in new_backends.iter_mut() {
            if !backend.health.is_healthy() || state.connections.contains_key(&backend.index) {
                continue;
            }
            match connector::open(
                backend.addr.clone(),
                backend.index,
                connect_deadline,
                self.sessions.clone(),
                self.settings.max_frame_len,
                self.clone(),
            )
            .await
            {
                Ok(connected) => {
                    info!(index = backend.index, addr = %backend.addr, "connected to backend");
                    state.connections.insert(backend.index, connected);
                }
                Err(e) => {
                    warn!(index = backend.index, addr = %backend.addr, error = %e, "failed to connect to backend, demoting");
                    backend.health = Health::Unhealthy;
                }
            }
        }

        state.backends = new_backends;
        state.rebuild_cursor();

        Ok(())
    }

    /// select walks the cursor at most `len(healthy ∩ connected)` times,
    /// skipping entries no longer live, and returns the first live writer.
    pub async fn select(&self) -> Option<Arc<BackendConn>> {
        let mut state = self.state.lock().await;
        let attempts = state.cursor.len();
        for _ in 0..attempts {
            if state.cursor.is_empty() {
                return None;
            }
            let pos = state.cursor_pos % state.cursor.len();
            let index = state.cursor[pos];
            state.cursor_pos = (pos + 1) % state.cursor.len();

            if let Some(connected) = state.connections.get(&index) {
                let is_healthy = state
                    .backends
                    .iter()
                    .find(|b| b.index == index)
                    .map(|b| b.health.is_healthy())
                    .unwrap_or(false);
                if is_healthy {
                    return Some(connected.conn.clone());
                }
            }
        }
        None
    }

    /// close_backend tears down one backend's connection and removes it from
    /// the cursor: used both by a reader task reacting to its own I/O error,
    /// and (indirectly, via reload) by health-loss detection.
    pub async fn close_backend(&self, index: usize) {
        let mut state = self.state.lock().await;
        if let Some(connected) = state.connections.remove(&index) {
            connected.reader_task.abort();
        }
        if let Some(backend) = state.backends.iter_mut().find(|b| b.index == index) {
            backend.health = Health::Unhealthy;
        }
        state.rebuild_cursor();
    }

    pub async fn connected_healthy_count(&self) -> usize {
        self.state.lock().await.cursor.len()
    }
}

async fn parse_servers_file(path: &str) -> Result<Vec<BackendAddr>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let parsed: Vec<BackendAddr> = serde_json::from_str(&raw)?;

    let mut seen = std::collections::HashSet::new();
    let mut deduped = Vec::with_capacity(parsed.len());
    for addr in parsed {
        if seen.insert(addr.clone()) {
            deduped.push(addr);
        }
    }
    Ok(deduped)
}
