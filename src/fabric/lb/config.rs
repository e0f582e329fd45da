use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::fabric::common::{Error, Result};

fn default_host() -> String {
    "0.0.0.0".to_string()
}
const fn default_port() -> u16 {
    8000
}
const fn default_health_check_timeout_secs() -> f64 {
    1.0
}
fn default_servers_file() -> String {
    "servers.json".to_string()
}
const fn default_max_frame_len() -> u32 {
    10 * 1024 * 1024
}
const fn default_client_read_chunk() -> usize {
    4096
}

/// Settings for the load balancer binary. Deserialized from an optional JSON
/// config file and then overridden field-by-field by CLI flags (see
/// `src/bin/lb.rs`). No global/static instance is kept: callers thread an
/// owned (or `Arc`-wrapped) `LbSettings` through the modules that need it.
#[derive(Debug, Clone, Deserialize)]
pub struct LbSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_health_check_timeout_secs")]
    pub health_check_timeout_secs: f64,
    #[serde(default = "default_servers_file")]
    pub servers_file: String,
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: u32,
    #[serde(default = "default_client_read_chunk")]
    pub client_read_chunk: usize,
}

impl Default for LbSettings {
    fn default() -> Self {
        LbSettings {
            host: default_host(),
            port: default_port(),
            health_check_timeout_secs: default_health_check_timeout_secs(),
            servers_file: default_servers_file(),
            max_frame_len: default_max_frame_len(),
            client_read_chunk: default_client_read_chunk(),
        }
    }
}

impl LbSettings {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Loads `lb.json` the way the teacher's `find_config_file` walks the
/// filesystem: current directory and its ancestors, then `~/.config/<name>/`,
/// `~/.<name>`, then `/etc/<name>/`. Returns `LbSettings::default()` if no
/// config file is found anywhere (config is optional; CLI flags and wire
/// defaults are enough to run).
pub fn load_lb_config(config_name: &str) -> Result<LbSettings> {
    match find_config_file(config_name) {
        Some(path) => {
            debug!(path = %path.display(), "loading load balancer config");
            let raw = std::fs::read_to_string(&path)?;
            let settings: LbSettings = serde_json::from_str(&raw)?;
            Ok(settings)
        }
        None => {
            debug!("no load balancer config file found, using defaults");
            Ok(LbSettings::default())
        }
    }
}

fn find_config_file(config_name: &str) -> Option<PathBuf> {
    if let Ok(start) = env::current_dir() {
        let mut dir = start.as_path();
        loop {
            let fp = Path::join(dir, config_name);
            if fp.exists() {
                return Some(fp);
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }

    let home = env::var("HOME").unwrap_or_else(|_| "~/".to_string());

    let conf_path = Path::join(Path::new(&home), Path::join(Path::new(".config/campusrelay"), config_name));
    if conf_path.exists() {
        return Some(conf_path);
    }

    let conf_path = Path::join(Path::new(&home), format!(".{config_name}"));
    if conf_path.exists() {
        return Some(conf_path);
    }

    let conf_path = Path::join(Path::new("/etc/campusrelay"), config_name);
    if conf_path.exists() {
        return Some(conf_path);
    }

    None
}

pub fn validate(settings: &LbSettings) -> Result<()> {
    if settings.health_check_timeout_secs <= 0.0 {
        return Err(Error::new("health_check_timeout_secs must be > 0"));
    }
    if settings.max_frame_len < 5 {
        return Err(Error::new("max_frame_len must be large enough to hold an empty envelope"));
    }
    Ok(())
}
