//! Client settings.

use std::path::{Path, PathBuf};

use quire_common::{ConfigError, FileStore};
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_SERVER: &str = "http://127.0.0.1:4000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay server base URL. `http`/`https`; the socket scheme follows it.
    pub server: String,
    /// How often the mirrored file is checked for local edits.
    pub poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_owned(),
            poll_interval_ms: 250,
        }
    }
}

impl ClientConfig {
    pub fn server_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.server)
    }

    /// Load from `path`, or the per-user config file when `None`.
    ///
    /// A missing file yields the defaults.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path.map(Path::to_path_buf).or_else(default_config_path) else {
            return Ok(Self::default());
        };
        FileStore::new(path)
            .with_env_substitution()
            .load_or_default()
            .await
    }
}

/// `$XDG_CONFIG_HOME/quire/config.toml` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("quire").join("config.toml"))
}
