use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use tokio::sync::watch;

/// Latched shutdown switch observed by the dispatch loop.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Flips every [`Shutdown`] created alongside it. Triggering is permanent.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested. Never resolves if the
    /// trigger was dropped without firing.
    pub async fn triggered(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// What should we do when the user stops this program?
/// SIGINT and SIGTERM latch the shutdown switch; the loop exits at its next
/// safe point and an in-flight handler is left to finish.
pub fn handle_shutdown(trigger: ShutdownTrigger) -> std::io::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::spawn(move || {
        for signal in signals.forever() {
            log::warn!("Received signal {signal}, shutting down");
            let _ = sd_notify::notify(false, &[sd_notify::NotifyState::Stopping]);
            trigger.trigger();
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_is_latched() {
        let (trigger, mut shutdown) = shutdown_channel();
        let observer = shutdown.clone();
        assert!(!shutdown.is_triggered());

        trigger.trigger();
        assert!(shutdown.is_triggered());
        assert!(observer.is_triggered());

        // Already triggered, must resolve right away
        tokio::time::timeout(Duration::from_secs(1), shutdown.triggered())
            .await
            .expect("Shutdown did not resolve");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trigger_never_fires() {
        let (trigger, mut shutdown) = shutdown_channel();
        drop(trigger);

        let res = tokio::time::timeout(Duration::from_secs(5), shutdown.triggered()).await;
        assert!(res.is_err());
        assert!(!shutdown.is_triggered());
    }
}
