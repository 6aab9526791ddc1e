use std::path::{Path, PathBuf};

use crate::config::ConfigError;

/// On-disk configuration. Every key is optional; anything left out falls
/// back to the environment or the built-in defaults.
///
/// ```toml
/// exec = "/usr/local/bin/on-event"
/// endpoint = "tcp://10.0.0.5:2376"
/// retry_interval = 10
///
/// [tls]
/// cert = "/etc/docker/cert.pem"
/// key = "/etc/docker/key.pem"
/// ca = "/etc/docker/ca.pem"
/// ```
#[derive(Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DockeractdConfigFile {
    pub exec: Option<PathBuf>,
    pub endpoint: Option<String>,
    /// Seconds between reconnect attempts.
    pub retry_interval: Option<u64>,
    #[serde(default)]
    pub tls: TlsEntry,
}

#[derive(Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsEntry {
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub ca: Option<PathBuf>,
}

impl DockeractdConfigFile {
    fn try_init_from_string(config: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config)?)
    }

    pub fn try_init(path: &Path) -> Result<Self, ConfigError> {
        let config = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::try_init_from_string(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let input = r#"
            exec = "/usr/local/bin/on-event"
            endpoint = "tcp://10.0.0.5:2376"
            retry_interval = 10

            [tls]
            cert = "/etc/docker/cert.pem"
            key = "/etc/docker/key.pem"
            ca = "/etc/docker/ca.pem"
        "#;
        let config = DockeractdConfigFile::try_init_from_string(input).expect("Failed to parse");

        assert_eq!(config.exec, Some(PathBuf::from("/usr/local/bin/on-event")));
        assert_eq!(config.endpoint.as_deref(), Some("tcp://10.0.0.5:2376"));
        assert_eq!(config.retry_interval, Some(10));
        assert_eq!(config.tls.ca, Some(PathBuf::from("/etc/docker/ca.pem")));
    }

    #[test]
    fn test_empty_config() {
        let config = DockeractdConfigFile::try_init_from_string("").unwrap();
        assert_eq!(config, DockeractdConfigFile::default());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let res = DockeractdConfigFile::try_init_from_string("retry = 3");
        assert!(matches!(res, Err(ConfigError::Toml(_))), "{:?}", res);
    }

    #[test]
    fn test_negative_interval_is_rejected() {
        let res = DockeractdConfigFile::try_init_from_string("retry_interval = -1");
        assert!(matches!(res, Err(ConfigError::Toml(_))), "{:?}", res);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let res = DockeractdConfigFile::try_init(&dir.path().join("dockeractd.toml"));
        assert!(matches!(res, Err(ConfigError::Read { .. })), "{:?}", res);
    }
}
