//! Narrow capability interface over the container runtime.
//!
//! The dispatch loop only needs three things from the engine: open a
//! session, subscribe to its event stream and inspect a container by id.
//! [`docker::DockerRuntime`] provides them over the Docker Engine API.

use std::{fmt, path::PathBuf};

use async_trait::async_trait;
use futures_util::stream::BoxStream;

pub mod docker;
pub mod event;

pub use event::{ContainerEvent, ContainerSnapshot, EventActor};

const DEFAULT_HTTP_PORT: u16 = 2375;
const DEFAULT_TLS_PORT: u16 = 2376;

/// Stream of events produced by a live subscription. The stream ending
/// means the underlying transport went away.
pub type EventStream = BoxStream<'static, Result<ContainerEvent, RuntimeError>>;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Docker API error: {0}")]
    DockerApi(#[from] bollard::errors::Error),
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Invalid endpoint {0}: {1}")]
    Parse(String, url::ParseError),
    #[error("Unsupported endpoint {0}. Expected unix://, tcp://, http:// or https://")]
    Unsupported(String),
}

/// Where the runtime's control API listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    /// `addr` is `host:port`; `https` marks endpoints that were given an
    /// explicit `https://` scheme.
    Tcp { addr: String, https: bool },
}

impl Endpoint {
    pub fn parse(endpoint: &str) -> Result<Self, EndpointError> {
        let url = url::Url::parse(endpoint)
            .map_err(|e| EndpointError::Parse(endpoint.to_string(), e))?;

        match url.scheme() {
            "unix" => {
                if url.path().is_empty() {
                    return Err(EndpointError::Unsupported(endpoint.to_string()));
                }
                Ok(Endpoint::Unix(PathBuf::from(url.path())))
            }
            scheme @ ("tcp" | "http" | "https") => {
                let https = scheme == "https";
                let host = url
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| EndpointError::Unsupported(endpoint.to_string()))?;
                let port = url.port().unwrap_or(if https {
                    DEFAULT_TLS_PORT
                } else {
                    DEFAULT_HTTP_PORT
                });
                Ok(Endpoint::Tcp {
                    addr: format!("{host}:{port}"),
                    https,
                })
            }
            _ => Err(EndpointError::Unsupported(endpoint.to_string())),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            Endpoint::Tcp { addr, https: true } => write!(f, "https://{addr}"),
            Endpoint::Tcp { addr, https: false } => write!(f, "tcp://{addr}"),
        }
    }
}

/// Client certificate, key and CA bundle used for TLS sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: PathBuf,
}

/// Opens sessions against the runtime. Implementations must be cheap to
/// call repeatedly since the loop reconnects through them.
#[async_trait]
pub trait Runtime: Send + Sync {
    type Session: Session;

    async fn connect(
        &self,
        endpoint: &Endpoint,
        tls: Option<&TlsMaterial>,
    ) -> Result<Self::Session, RuntimeError>;
}

/// An established connection to the runtime.
#[async_trait]
pub trait Session: Send + Sync {
    async fn subscribe(&self) -> Result<EventStream, RuntimeError>;

    async fn inspect(&self, container_id: &str) -> Result<ContainerSnapshot, RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unix_endpoint() {
        let endpoint = Endpoint::parse("unix:///var/run/docker.sock").unwrap();
        assert_eq!(endpoint, Endpoint::Unix(PathBuf::from("/var/run/docker.sock")));
        assert_eq!(endpoint.to_string(), "unix:///var/run/docker.sock");
    }

    #[test]
    fn test_parse_tcp_endpoints() {
        let cases = vec![
            ("tcp://127.0.0.1:2375", "127.0.0.1:2375", false),
            ("http://docker.local:8080", "docker.local:8080", false),
            ("tcp://docker.local", "docker.local:2375", false),
            ("https://docker.local", "docker.local:2376", true),
        ];

        for (raw, addr, https) in cases {
            let endpoint = Endpoint::parse(raw).unwrap();
            assert_eq!(
                endpoint,
                Endpoint::Tcp {
                    addr: addr.to_string(),
                    https
                },
                "{raw}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_unknown_schemes() {
        let res = Endpoint::parse("npipe:////./pipe/docker_engine");
        assert!(matches!(res, Err(EndpointError::Unsupported(_))), "{res:?}");

        let res = Endpoint::parse("not an endpoint");
        assert!(matches!(res, Err(EndpointError::Parse(_, _))), "{res:?}");
    }
}
