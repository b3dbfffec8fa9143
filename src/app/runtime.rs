use super::{Orchestrator, ShutdownReason};
use crate::error::{PenareiaError, Result};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::info;

impl Orchestrator {
    /// Wait for a shutdown signal (SIGINT/SIGTERM or an internally-raised
    /// reason), then run the shutdown sequence and return the process exit
    /// code.
    pub async fn run(&mut self) -> Result<i32> {
        info!("Penareia capture daemon is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| PenareiaError::system("shutdown sender already taken"))?;
        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| PenareiaError::system("shutdown receiver already taken"))?;

        self.setup_signal_handlers(shutdown_sender).await;

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| PenareiaError::system("shutdown channel closed unexpectedly"))?;
        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?;
        info!("Penareia capture daemon shutdown complete");
        Ok(exit_code)
    }

    async fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        #[cfg(unix)]
        {
            let sigterm_sender = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                if let Some(()) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler")
                    .recv()
                    .await
                {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = sigterm_sender.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        let sigint_sender = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = sigint_sender.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}
