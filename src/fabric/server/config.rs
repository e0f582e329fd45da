use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::fabric::common::Result;

fn default_host() -> String {
    "0.0.0.0".to_string()
}
const fn default_port() -> u16 {
    9001
}
fn default_db_path() -> String {
    "classroom.redb".to_string()
}
const fn default_max_frame_len() -> u32 {
    10 * 1024 * 1024
}

/// Settings for the application server binary. Mirrors `LbSettings`'
/// search-path-then-CLI-override layering; see `src/bin/appserver.rs`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            max_frame_len: default_max_frame_len(),
        }
    }
}

impl ServerSettings {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn load_server_config(config_name: &str) -> Result<ServerSettings> {
    match find_config_file(config_name) {
        Some(path) => {
            debug!(path = %path.display(), "loading application server config");
            let raw = std::fs::read_to_string(&path)?;
            let settings: ServerSettings = serde_json::from_str(&raw)?;
            Ok(settings)
        }
        None => {
            debug!("no application server config file found, using defaults");
            Ok(ServerSettings::default())
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
