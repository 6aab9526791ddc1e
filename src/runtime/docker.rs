//! Docker Engine backend using bollard.
//!
//! Every [`DockerRuntime::connect`] builds a fresh client for the configured
//! endpoint and pings the engine, so an unreachable endpoint or a failed TLS
//! handshake surfaces at connect time instead of on the first event.

use async_trait::async_trait;
use bollard::query_parameters::{
    EventsOptions, EventsOptionsBuilder, InspectContainerOptions, InspectContainerOptionsBuilder,
};
use bollard::{API_DEFAULT_VERSION, Docker};
use futures_util::StreamExt;
use tokio::sync::mpsc;

use super::{
    ContainerEvent, ContainerSnapshot, Endpoint, EventStream, Runtime, RuntimeError, Session,
    TlsMaterial,
};

/// Seconds bollard waits on a single request before giving up.
const REQUEST_TIMEOUT_SECS: u64 = 120;
/// Events read ahead of the handler. Order is kept; the engine side waits
/// when the buffer is full.
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, Default)]
pub struct DockerRuntime;

pub struct DockerSession {
    docker: Docker,
}

impl DockerRuntime {
    fn client(endpoint: &Endpoint, tls: Option<&TlsMaterial>) -> Result<Docker, RuntimeError> {
        let docker = match (endpoint, tls) {
            (Endpoint::Unix(path), _) => Docker::connect_with_unix(
                &path.to_string_lossy(),
                REQUEST_TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            )?,
            (Endpoint::Tcp { addr, .. }, Some(tls)) => {
                log::info!("Enabling TLS...");
                Docker::connect_with_ssl(
                    addr,
                    &tls.key,
                    &tls.cert,
                    &tls.ca,
                    REQUEST_TIMEOUT_SECS,
                    API_DEFAULT_VERSION,
                )?
            }
            // https endpoints without TLS material never get this far,
            // `Daemon::new` rejects them.
            (Endpoint::Tcp { addr, .. }, None) => {
                Docker::connect_with_http(addr, REQUEST_TIMEOUT_SECS, API_DEFAULT_VERSION)?
            }
        };
        Ok(docker)
    }
}

#[async_trait]
impl Runtime for DockerRuntime {
    type Session = DockerSession;

    async fn connect(
        &self,
        endpoint: &Endpoint,
        tls: Option<&TlsMaterial>,
    ) -> Result<DockerSession, RuntimeError> {
        log::info!("Attaching to {endpoint}");
        let docker = Self::client(endpoint, tls)?;
        docker.ping().await?;
        Ok(DockerSession { docker })
    }
}

#[async_trait]
impl Session for DockerSession {
    async fn subscribe(&self) -> Result<EventStream, RuntimeError> {
        let options: EventsOptions = EventsOptionsBuilder::new().build();
        let docker = self.docker.clone();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        // The forwarder owns the client so the stream outlives this borrow.
        // It stops once the receiving side is dropped.
        tokio::spawn(async move {
            let mut events = Box::pin(docker.events(Some(options)));
            loop {
                let next = tokio::select! {
                    () = tx.closed() => break,
                    next = events.next() => next,
                };
                let Some(message) = next else {
                    break;
                };
                let item = message
                    .map(ContainerEvent::from)
                    .map_err(RuntimeError::from);
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });

        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerSnapshot, RuntimeError> {
        let options: InspectContainerOptions = InspectContainerOptionsBuilder::new().build();

        let info = self
            .docker
            .inspect_container(container_id, Some(options))
            .await?;

        Ok(ContainerSnapshot::from_inspect(&info)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_is_built_lazily() {
        // bollard does not touch the network until the first request
        let tcp = Endpoint::parse("tcp://127.0.0.1:2375").unwrap();
        assert!(DockerRuntime::client(&tcp, None).is_ok());
    }

    #[tokio::test]
    async fn test_connect_to_missing_socket_fails() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Endpoint::Unix(dir.path().join("missing.sock"));

        let res = DockerRuntime.connect(&endpoint, None).await;
        assert!(matches!(res, Err(RuntimeError::DockerApi(_))));
    }
}
