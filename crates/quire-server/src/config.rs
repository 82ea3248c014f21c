use std::net::SocketAddr;
use std::path::Path;

use quire_common::config::{ConfigError, FileStore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CoreConfig {
    pub listen_addr: SocketAddr,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 4000)),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RelayConfig {
    /// Frames buffered per room before slow connections start lagging.
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// A document available from startup.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct SeedDocument {
    pub doc_id: i64,
    pub name: String,
    #[serde(default)]
    pub markdown: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub seed: Vec<SeedDocument>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub core: CoreConfig,
    pub relay: RelayConfig,
    pub storage: StorageConfig,
}

impl ServerConfig {
    /// Load from a TOML file, substituting `$VAR` environment references.
    ///
    /// A missing file yields the defaults.
    pub async fn load(config_file: impl AsRef<Path>) -> Result<ServerConfig, ConfigError> {
        FileStore::new(config_file)
            .with_env_substitution()
            .load_or_default()
            .await
    }
}
