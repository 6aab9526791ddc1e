use std::{
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{io::AsyncWriteExt, process::Command};

use crate::runtime::{ContainerEvent, ContainerSnapshot};

/// What the handler receives on stdin: the event plus whatever the runtime
/// knew about the container at dispatch time (`null` when the lookup failed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "Event")]
    pub event: ContainerEvent,
    #[serde(rename = "Container")]
    pub container: Option<ContainerSnapshot>,
}

impl Payload {
    /// Newline terminated JSON document.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = serde_json::to_vec(self)?;
        buf.push(b'\n');
        Ok(buf)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to spawn {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write payload to {path:?}: {source}")]
    Stdin {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed waiting for {path:?}: {source}")]
    Wait {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path:?} exited with {status}")]
    ExitStatus { path: PathBuf, status: ExitStatus },
}

/// Receives one payload per event. The loop awaits each call before reading
/// the next event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, payload: &Payload) -> Result<(), HandlerError>;
}

/// Runs an external program once per event, feeding it the payload on stdin.
/// Its stdout and stderr are the daemon's own.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    program: PathBuf,
}

impl CommandHandler {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl EventHandler for CommandHandler {
    async fn handle(&self, payload: &Payload) -> Result<(), HandlerError> {
        let input = payload.to_json()?;
        let path = &self.program;

        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| HandlerError::Spawn {
                path: path.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&input).await {
                Ok(()) => {}
                // The handler is free to ignore its input
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    log::debug!("{path:?} closed stdin before reading the payload");
                }
                Err(source) => {
                    let _ = child.kill().await;
                    return Err(HandlerError::Stdin {
                        path: path.clone(),
                        source,
                    });
                }
            }
        }

        let status = child.wait().await.map_err(|source| HandlerError::Wait {
            path: path.clone(),
            source,
        })?;

        if !status.success() {
            return Err(HandlerError::ExitStatus {
                path: path.clone(),
                status,
            });
        }

        log::info!("Handler {path:?} exited with {status}");
        Ok(())
    }
}
