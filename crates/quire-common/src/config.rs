//! File-backed configuration loading.
//!
//! [`FileStore`] reads and writes any serde type, choosing JSON or TOML by
//! file extension. [`substitute_env`] expands `$VAR` references so secrets
//! and deployment values can live in the environment.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use miette::Diagnostic;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors raised while loading or saving configuration.
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("error reading config file {path}: {source}")]
    #[diagnostic(code(quire::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error parsing config file {path}: {message}")]
    #[diagnostic(code(quire::config::parse), help("check the file against the documented keys"))]
    Parse { path: PathBuf, message: String },

    #[error("error serializing config: {0}")]
    #[diagnostic(code(quire::config::serialize))]
    Serialize(String),

    #[error("unsupported config format for {0}")]
    #[diagnostic(
        code(quire::config::format),
        help("use a .toml or .json file")
    )]
    UnsupportedFormat(PathBuf),
}

/// The trait for loading configuration data.
pub trait Loader<T> {
    /// Loads the configuration data.
    fn load(&self) -> impl Future<Output = Result<T, ConfigError>> + Send;
}

/// The trait for saving configuration data.
pub trait Saver<T> {
    /// Saves the configuration data.
    fn save(&self, config: &T) -> impl Future<Output = Result<(), ConfigError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

/// An implementation of [`Loader`] and [`Saver`] that reads and writes a configuration file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    expand_env: bool,
}

impl FileStore {
    /// Create a new [`FileStore`] with the given path.
    ///
    /// Data is serialized and deserialized according to the file extension,
    /// `.json` or `.toml`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            expand_env: false,
        }
    }

    /// Expand `$VAR` references before parsing.
    pub fn with_env_substitution(mut self) -> Self {
        self.expand_env = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn format(&self) -> Result<Format, ConfigError> {
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            _ => Err(ConfigError::UnsupportedFormat(self.path.clone())),
        }
    }

    fn read<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let format = self.format()?;
        let mut contents = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        if self.expand_env {
            contents = substitute_env(&contents);
        }
        let parse_error = |message: String| ConfigError::Parse {
            path: self.path.clone(),
            message,
        };
        match format {
            Format::Json => serde_json::from_str(&contents).map_err(|e| parse_error(e.to_string())),
            Format::Toml => toml::from_str(&contents).map_err(|e| parse_error(e.to_string())),
        }
    }

    fn write<T: Serialize>(&self, config: &T) -> Result<(), ConfigError> {
        let contents = match self.format()? {
            Format::Json => serde_json::to_string_pretty(config)
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Format::Toml => {
                toml::to_string_pretty(config).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, contents).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Load the file, or `T::default()` if it does not exist.
    pub async fn load_or_default<T>(&self) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Default + Send,
    {
        if !self.exists() {
            tracing::debug!(path = %self.path.display(), "no config file, using defaults");
            return Ok(T::default());
        }
        Loader::<T>::load(self).await
    }
}

impl<T: DeserializeOwned + Send> Loader<T> for FileStore {
    async fn load(&self) -> Result<T, ConfigError> {
        self.read()
    }
}

impl<T: Serialize + Sync> Saver<T> for FileStore {
    async fn save(&self, config: &T) -> Result<(), ConfigError> {
        self.write(config)
    }
}

/// Replace every `$NAME` with the value of environment variable `NAME`.
///
/// Names are `[A-Za-z0-9_]+`. Unset variables are left as written.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| env::var(name).ok())
}

fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..name_len];

        match (name.is_empty(), lookup(name)) {
            (false, Some(value)) => out.push_str(&value),
            _ => {
                out.push('$');
                out.push_str(name);
            }
        }
        rest = &after[name_len..];
    }
    out.push_str(rest);
    out
}
