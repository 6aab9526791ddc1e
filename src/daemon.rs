//! Connection and event-dispatch loop.
//!
//! [`Daemon::run`] keeps one subscription to the runtime's event stream
//! alive for the life of the process. Events are handed to the
//! [`EventHandler`] one at a time, in arrival order, and the loop does not
//! read the next event until the handler returns. Connection failures are
//! retried forever after a fixed delay. The shutdown switch is checked before
//! every connection attempt, while connecting, during the retry delay and
//! while waiting for events.

use std::time::Duration;

use futures_util::StreamExt;

use crate::config::{ConfigError, DaemonOptions};
use crate::handler::{EventHandler, Payload};
use crate::runtime::{
    ContainerEvent, Endpoint, EventStream, Runtime, RuntimeError, Session, TlsMaterial,
};
use crate::signals::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Disconnected,
    Connecting,
    Subscribed,
    ShuttingDown,
    Terminated,
}

/// Why the loop stopped consuming a subscription.
enum Detach {
    Shutdown,
    /// The stream ended cleanly; reconnect after the retry delay so an
    /// endpoint that keeps closing the stream cannot spin the loop.
    Closed,
    /// The stream yielded a transport error; reconnect after the retry delay.
    Failed(RuntimeError),
}

pub struct Daemon<R, H> {
    runtime: R,
    handler: H,
    endpoint: Endpoint,
    tls: Option<TlsMaterial>,
    retry_interval: Duration,
}

impl<R, H> Daemon<R, H>
where
    R: Runtime,
    H: EventHandler,
{
    pub fn new(options: &impl DaemonOptions, runtime: R, handler: H) -> Result<Self, ConfigError> {
        let endpoint = Endpoint::parse(options.endpoint())?;
        let tls = options.tls();
        if options.tls_verify() && tls.is_none() {
            return Err(ConfigError::IncompleteTls);
        }
        if matches!(endpoint, Endpoint::Tcp { https: true, .. }) && tls.is_none() {
            return Err(ConfigError::TlsRequired(endpoint.to_string()));
        }

        Ok(Self {
            runtime,
            handler,
            endpoint,
            tls,
            retry_interval: options.retry_interval(),
        })
    }

    /// Runs until `shutdown` fires. Handler and connection failures are
    /// logged and never end the loop.
    pub async fn run(&self, mut shutdown: Shutdown) {
        let mut state = LoopState::Disconnected;
        let mut announced = false;

        loop {
            if shutdown.is_triggered() {
                break;
            }

            Self::enter(&mut state, LoopState::Connecting);
            let attached = tokio::select! {
                biased;
                () = shutdown.triggered() => break,
                attached = self.attach() => attached,
            };
            let (session, events) = match attached {
                Ok(attached) => attached,
                Err(e) => {
                    log::error!("Unable to attach to {}: {e}", self.endpoint);
                    Self::enter(&mut state, LoopState::Disconnected);
                    if self.wait_retry(&mut shutdown).await {
                        continue;
                    }
                    break;
                }
            };

            Self::enter(&mut state, LoopState::Subscribed);
            log::info!("Listening for events on {}", self.endpoint);
            if !announced {
                let _ = sd_notify::notify(false, &[sd_notify::NotifyState::Ready]);
                announced = true;
            }

            match self.consume(&session, events, &mut shutdown).await {
                Detach::Shutdown => break,
                Detach::Closed => {
                    log::warn!("Event stream from {} closed, reconnecting", self.endpoint);
                    Self::enter(&mut state, LoopState::Disconnected);
                    if !self.wait_retry(&mut shutdown).await {
                        break;
                    }
                }
                Detach::Failed(e) => {
                    log::error!("Lost event stream from {}: {e}", self.endpoint);
                    Self::enter(&mut state, LoopState::Disconnected);
                    if !self.wait_retry(&mut shutdown).await {
                        break;
                    }
                }
            }
        }

        Self::enter(&mut state, LoopState::ShuttingDown);
        log::info!("Shutting down");
        Self::enter(&mut state, LoopState::Terminated);
    }

    fn enter(state: &mut LoopState, next: LoopState) {
        log::debug!("{state:?} -> {next:?}");
        *state = next;
    }

    async fn attach(&self) -> Result<(R::Session, EventStream), RuntimeError> {
        let session = self
            .runtime
            .connect(&self.endpoint, self.tls.as_ref())
            .await?;
        let events = session.subscribe().await?;
        Ok((session, events))
    }

    /// Sleeps for the retry interval. Returns `false` if shutdown was
    /// requested before or during the wait.
    async fn wait_retry(&self, shutdown: &mut Shutdown) -> bool {
        if self.retry_interval.is_zero() {
            return !shutdown.is_triggered();
        }

        log::info!("Retrying in {:?}", self.retry_interval);
        tokio::select! {
            biased;
            () = shutdown.triggered() => false,
            () = tokio::time::sleep(self.retry_interval) => true,
        }
    }

    async fn consume(
        &self,
        session: &R::Session,
        mut events: EventStream,
        shutdown: &mut Shutdown,
    ) -> Detach {
        loop {
            let next = tokio::select! {
                biased;
                () = shutdown.triggered() => return Detach::Shutdown,
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) => self.process(session, event).await,
                Some(Err(e)) => return Detach::Failed(e),
                None => return Detach::Closed,
            }
        }
    }

    /// Dispatches one event. Failing to inspect the container is fine; the
    /// handler then gets a `null` container.
    async fn process(&self, session: &R::Session, event: ContainerEvent) {
        let when = event
            .timestamp()
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_default();
        log::info!(
            "Received {} {} for {} {when}",
            event.kind,
            event.status,
            event.id
        );

        let container = if event.id.is_empty() {
            None
        } else {
            match session.inspect(&event.id).await {
                Ok(snapshot) => {
                    log::debug!(
                        "Inspected {} ({})",
                        event.id,
                        snapshot.name().unwrap_or("unnamed")
                    );
                    Some(snapshot)
                }
                Err(e) => {
                    log::debug!("Unable to inspect container {}: {e}", event.id);
                    None
                }
            }
        };

        let payload = Payload { event, container };
        if let Err(e) = self.handler.handle(&payload).await {
            log::error!("Error executing handler: {e}");
        }
    }
}
