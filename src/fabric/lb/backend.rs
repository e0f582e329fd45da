use serde::Deserialize;

/// One entry from `servers.json`: `{"host": ..., "port": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct BackendAddr {
    pub host: String,
    pub port: u16,
}

impl BackendAddr {
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for BackendAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Unhealthy,
}

impl Health {
    pub fn is_healthy(self) -> bool {
        matches!(self, Health::Healthy)
    }
}

/// A backend slot in the directory's `Vec<Backend>`. `index` is its position
/// in that vector and is the stable identifier used everywhere else
/// (`BackendConn`, `RRCursor`) — it's only meaningful within one reload
/// cycle's backend list.
#[derive(Debug, Clone)]
pub struct Backend {
    pub index: usize,
    pub addr: BackendAddr,
    pub health: Health,
}
