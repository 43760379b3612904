use tokio::sync::watch;
use tokio::task::JoinHandle;
use anyhow::Result;

/// Holds running tasks and shutdown channel for the node.
/// Call `shutdown()` to gracefully stop services.
pub struct ServiceHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handles: Vec<(&'static str, JoinHandle<anyhow::Result<()>>)>,
}

impl ServiceHandle {
    /// Create a new ServiceHandle and return it together with a Receiver clonable by tasks.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        let handle = ServiceHandle { shutdown_tx: tx, join_handles: vec![] };
        (handle, rx)
    }

    /// Attach a background task handle (so we wait on it on shutdown).
    pub fn attach(&mut self, name: &'static str, h: JoinHandle<anyhow::Result<()>>) {
        self.join_handles.push((name, h));
    }

    pub fn task_count(&self) -> usize {
        self.join_handles.len()
    }

    /// Signal shutdown to all tasks and await them sequentially.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);

        for (name, h) in self.join_handles {
            match h.await {
                Ok(Ok(())) => tracing::debug!("{} stopped", name),
                Ok(Err(e)) => tracing::error!("{} returned error: {:?}", name, e),
                Err(e) => tracing::error!("{} join error: {:?}", name, e),
            }
        }
        Ok(())
    }
}

/// Resolve once shutdown has been signalled. If the sender is gone without ever
/// signalling, never resolve.
pub async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    let signalled = rx.wait_for(|stop| *stop).await.is_ok();
    if !signalled {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_stops_attached_tasks() {
        let (mut handle, rx) = ServiceHandle::new();
        for name in ["a", "b"] {
            let mut rx = rx.clone();
            handle.attach(name, tokio::spawn(async move {
                wait_for_shutdown(&mut rx).await;
                Ok(())
            }));
        }
        assert_eq!(handle.task_count(), 2);
        let stopped = tokio::time::timeout(Duration::from_secs(1), handle.shutdown()).await;
        tokio_test::assert_ok!(tokio_test::assert_ok!(stopped));
    }

    #[tokio::test]
    async fn already_signalled_resolves_immediately() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_millis(100), wait_for_shutdown(&mut rx))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_never_resolves() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let res = tokio::time::timeout(Duration::from_secs(60), wait_for_shutdown(&mut rx)).await;
        tokio_test::assert_err!(res);
    }
}
