#![forbid(unsafe_code)]

//! MiniSS configuration handling. Parses a TOML file into a strongly-typed
//! structure; every field has a default so an empty file is valid.

use serde::Deserialize;
use std::{fs, path::{Path, PathBuf}, time::Duration};
use tracing::debug;

use crate::{MinissError, MinissResult};

/// Configuration shared by the MiniSS tools.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MinissConfig {
    /// Logging verbosity (`error`, `warn`, `info`, `debug`, `trace`).
    pub log_level: Option<String>,

    /// age-encrypted static secret key.
    pub keystore_path: Option<PathBuf>,

    /// Address the server or proxy listens on.
    pub listen_addr: String,

    /// Remote MiniSS endpoint the proxy dials.
    pub connect_addr: Option<String>,

    /// Upper bound on a single handshake, in milliseconds.
    pub handshake_timeout_ms: Option<u64>,
}

impl Default for MinissConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            keystore_path: None,
            listen_addr: default_listen_addr(),
            connect_addr: None,
            handshake_timeout_ms: None,
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:13371".to_string()
}

impl MinissConfig {
    /// Load a configuration file from the given path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> MinissResult<Self> {
        let data = fs::read_to_string(&path)?;
        let cfg = Self::from_toml(&data)?;
        debug!(path = %path.as_ref().display(), "loaded config");
        Ok(cfg)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(data: &str) -> MinissResult<Self> {
        let cfg = toml::from_str::<MinissConfig>(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load config alias version
    pub fn load<P: AsRef<Path>>(path: P) -> MinissResult<Self> {
        Self::from_file(path)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> MinissResult<()> {
        if self.handshake_timeout_ms == Some(0) {
            return Err(MinissError::InvalidConfig {
                field: "handshake_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.listen_addr.is_empty() {
            return Err(MinissError::InvalidConfig {
                field: "listen_addr",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = MinissConfig::from_toml("").unwrap();
        assert_eq!(cfg, MinissConfig::default());
        assert_eq!(cfg.listen_addr, "127.0.0.1:13371");
        assert_eq!(cfg.handshake_timeout(), None);
    }

    #[test]
    fn parses_all_fields() {
        let cfg = MinissConfig::from_toml(
            r#"
            log_level = "debug"
            keystore_path = "/var/lib/miniss/node.age"
            listen_addr = "0.0.0.0:9000"
            connect_addr = "10.0.0.2:13371"
            handshake_timeout_ms = 2500
            "#,
        )
        .unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.keystore_path, Some(PathBuf::from("/var/lib/miniss/node.age")));
        assert_eq!(cfg.listen_addr, "0.0.0.0:9000");
        assert_eq!(cfg.connect_addr.as_deref(), Some("10.0.0.2:13371"));
        assert_eq!(cfg.handshake_timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = MinissConfig::from_toml("handshake_timeout_ms = 0").unwrap_err();
        assert!(matches!(err, MinissError::InvalidConfig { field: "handshake_timeout_ms", .. }));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = MinissConfig::from_toml("listen_addr = ").unwrap_err();
        assert!(matches!(err, MinissError::ConfigParse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen_addr = \"127.0.0.1:4000\"").unwrap();
        let cfg = MinissConfig::load(file.path()).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:4000");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = MinissConfig::from_file("/nonexistent/miniss.toml").unwrap_err();
        assert!(matches!(err, MinissError::Io(_)));
    }
}
