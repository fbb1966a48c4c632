//! Configuration and session storage.
//!
//! Both files live in the platform config directory:
//! - `config.json`: node endpoint and transport settings
//! - `session.json`: the login session, readable by the owner only

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use circle_client::{ClientConfig, Session, DEFAULT_RPC_PATH, DEFAULT_WS_PATH};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.json";
const SESSION_FILE: &str = "session.json";

/// Overrides the configured node URL.
pub const NODE_URL_ENV: &str = "CIRCLE_NODE_URL";

fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("com", "ciphercircle", "circle")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Node base URL.
    #[serde(default = "default_node_url")]
    pub node_url: String,

    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,

    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_node_url() -> String {
    "http://localhost:2428".to_string()
}

fn default_rpc_path() -> String {
    DEFAULT_RPC_PATH.to_string()
}

fn default_ws_path() -> String {
    DEFAULT_WS_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_url: default_node_url(),
            rpc_path: default_rpc_path(),
            ws_path: default_ws_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load config from disk, or return the default, then apply the
    /// environment override.
    pub fn load() -> Result<Self> {
        let mut config = match read_json(&config_dir()?.join(CONFIG_FILE))? {
            Some(config) => config,
            None => Self::default(),
        };

        if let Ok(url) = std::env::var(NODE_URL_ENV) {
            if !url.trim().is_empty() {
                config.node_url = url.trim().to_string();
            }
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        write_private(&config_dir()?.join(CONFIG_FILE), self)
    }

    /// Transport settings for the client library.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            rpc_path: self.rpc_path.clone(),
            ws_path: self.ws_path.clone(),
            ..ClientConfig::default()
        }
        .with_request_timeout(Duration::from_secs(self.timeout_secs.max(1)))
    }
}

/// Load the saved session, if any.
pub fn load_session() -> Result<Option<Session>> {
    read_json(&config_dir()?.join(SESSION_FILE))
}

pub fn save_session(session: &Session) -> Result<()> {
    write_private(&config_dir()?.join(SESSION_FILE), session)
}

/// Delete the saved session. Returns false if there was none.
pub fn delete_session() -> Result<bool> {
    let path = config_dir()?.join(SESSION_FILE);
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(&path).with_context(|| format!("Failed to delete session at {path:?}"))?;
    Ok(true)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {path:?}"))?;
    let value =
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse {path:?}"))?;
    Ok(Some(value))
}

fn write_private<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let contents = serde_json::to_string_pretty(value)?;

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .with_context(|| format!("Failed to open {path:?}"))?;
        file.write_all(contents.as_bytes())?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).with_context(|| format!("Failed to write {path:?}"))?;
    }

    Ok(())
}
