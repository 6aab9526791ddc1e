use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    cli::Args,
    config_file::DockeractdConfigFile,
    runtime::{Endpoint, EndpointError, TlsMaterial},
};

pub const DEFAULT_ENDPOINT: &str = "unix:///var/run/docker.sock";
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unable to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("You must supply the --exec option")]
    MissingExec,
    #[error("Incomplete TLS material: a certificate, a key and a CA are all required")]
    IncompleteTls,
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("Endpoint {0} requires TLS material")]
    TlsRequired(String),
}

/// Everything the daemon needs to know at construction time.
pub trait DaemonOptions {
    fn cmd(&self) -> &Path;
    fn endpoint(&self) -> &str;
    fn retry_interval(&self) -> Duration;
    fn tls_verify(&self) -> bool;
    fn tls_cert_file(&self) -> Option<&Path>;
    fn tls_key_file(&self) -> Option<&Path>;
    fn tls_ca_file(&self) -> Option<&Path>;

    /// TLS material, present only when TLS is enabled and every file is set.
    fn tls(&self) -> Option<TlsMaterial> {
        if !self.tls_verify() {
            return None;
        }
        Some(TlsMaterial {
            cert: self.tls_cert_file()?.to_path_buf(),
            key: self.tls_key_file()?.to_path_buf(),
            ca: self.tls_ca_file()?.to_path_buf(),
        })
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub cmd: PathBuf,
    pub endpoint: String,
    pub retry_interval: Duration,
    pub tls_cert_file: Option<PathBuf>,
    pub tls_key_file: Option<PathBuf>,
    pub tls_ca_file: Option<PathBuf>,
    pub tls_verify: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cmd: PathBuf::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            tls_cert_file: None,
            tls_key_file: None,
            tls_ca_file: None,
            tls_verify: false,
        }
    }
}

impl DaemonOptions for Options {
    fn cmd(&self) -> &Path {
        &self.cmd
    }
    fn endpoint(&self) -> &str {
        &self.endpoint
    }
    fn retry_interval(&self) -> Duration {
        self.retry_interval
    }
    fn tls_verify(&self) -> bool {
        self.tls_verify
    }
    fn tls_cert_file(&self) -> Option<&Path> {
        self.tls_cert_file.as_deref()
    }
    fn tls_key_file(&self) -> Option<&Path> {
        self.tls_key_file.as_deref()
    }
    fn tls_ca_file(&self) -> Option<&Path> {
        self.tls_ca_file.as_deref()
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.is_file().then_some(path)
}

impl Options {
    /// Defaults overlaid with `DOCKER_HOST` and `DOCKER_CERT_PATH`.
    pub fn from_env() -> Self {
        Self::from_env_vars(
            std::env::var("DOCKER_HOST").ok(),
            std::env::var_os("DOCKER_CERT_PATH").map(PathBuf::from),
        )
    }

    fn from_env_vars(docker_host: Option<String>, cert_path: Option<PathBuf>) -> Self {
        let mut options = Self::default();

        if let Some(host) = docker_host.filter(|h| !h.is_empty()) {
            options.endpoint = host;
        }

        // TLS is turned on only when the directory holds all three files
        if let Some(dir) = cert_path.filter(|p| !p.as_os_str().is_empty()) {
            options.tls_cert_file = existing(dir.join("cert.pem"));
            options.tls_key_file = existing(dir.join("key.pem"));
            options.tls_ca_file = existing(dir.join("ca.pem"));
            options.tls_verify = options.tls_cert_file.is_some()
                && options.tls_key_file.is_some()
                && options.tls_ca_file.is_some();
        }

        options
    }

    /// Environment, then the config file named by `--config`, then flags.
    pub fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => DockeractdConfigFile::try_init(path)?,
            None => DockeractdConfigFile::default(),
        };
        let options = Self::from_env().merge(file, args)?;
        options.validate()?;
        Ok(options)
    }

    fn merge(mut self, file: DockeractdConfigFile, args: &Args) -> Result<Self, ConfigError> {
        if let Some(cmd) = args.exec.clone().or(file.exec) {
            self.cmd = cmd;
        }
        if let Some(endpoint) = args.endpoint.clone().or(file.endpoint) {
            self.endpoint = endpoint;
        }
        if let Some(secs) = args.retry_interval.or(file.retry_interval) {
            self.retry_interval = Duration::from_secs(secs);
        }

        let cert = args.tls_cert.clone().or(file.tls.cert);
        let key = args.tls_key.clone().or(file.tls.key);
        let ca = args.tls_ca.clone().or(file.tls.ca);

        if cert.is_some() || key.is_some() || ca.is_some() {
            self.tls_cert_file = cert.or(self.tls_cert_file);
            self.tls_key_file = key.or(self.tls_key_file);
            self.tls_ca_file = ca.or(self.tls_ca_file);
            if self.tls_cert_file.is_none()
                || self.tls_key_file.is_none()
                || self.tls_ca_file.is_none()
            {
                return Err(ConfigError::IncompleteTls);
            }
            self.tls_verify = true;
        }

        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cmd.as_os_str().is_empty() {
            return Err(ConfigError::MissingExec);
        }
        if let Endpoint::Tcp { https: true, .. } = Endpoint::parse(&self.endpoint)? {
            if !self.tls_verify {
                return Err(ConfigError::TlsRequired(self.endpoint.clone()));
            }
        }
        Ok(())
    }
}
