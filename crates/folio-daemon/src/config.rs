//! Daemon settings file (TOML).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading the settings file.
#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for [`DaemonConfig`].
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DaemonConfig {
    /// Address the HTTP service binds to. Localhost only by default;
    /// the design assumes a single trusted local editor.
    #[serde(default = "default_bind")]
    pub(crate) bind: SocketAddr,

    /// Path of the site configuration document.
    #[serde(default = "default_document")]
    pub(crate) document: PathBuf,

    /// Bound on how long a write waits for the document lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub(crate) lock_timeout_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            document: default_document(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl DaemonConfig {
    /// Loads the settings file; a missing file yields the defaults.
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            },
            Err(err) => return Err(ConfigError::Io(err)),
        };
        Self::from_toml(&content)
    }

    pub(crate) fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

fn default_bind() -> SocketAddr {
    "127.0.0.1:7878".parse().expect("static default bind address")
}

fn default_document() -> PathBuf {
    PathBuf::from("site.yaml")
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::DaemonConfig;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = DaemonConfig::from_toml("").expect("parse empty");
        assert_eq!(config.bind.port(), 7878);
        assert_eq!(config.document, std::path::Path::new("site.yaml"));
        assert_eq!(config.lock_timeout_ms, 5000);
    }

    #[test]
    fn test_partial_toml_overrides_only_named_fields() {
        let config = DaemonConfig::from_toml("document = \"/srv/site/config.yaml\"\n")
            .expect("parse partial");
        assert_eq!(config.document, std::path::Path::new("/srv/site/config.yaml"));
        assert_eq!(config.lock_timeout_ms, 5000);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = DaemonConfig::load(&temp.path().join("absent.toml")).expect("load");
        assert_eq!(config.lock_timeout_ms, 5000);
    }
}
