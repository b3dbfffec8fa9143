use super::{ComponentState, Orchestrator};
use crate::error::{PenareiaError, Result};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info};

const COMPONENT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl Orchestrator {
    /// Cancel the shared token and join every spawned task in reverse
    /// startup order, bounding each join with a timeout so one stuck
    /// component can't hang the whole shutdown.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        let http = self.http_handle.take();
        if let Err(e) = self.stop_component("http", http).await {
            error!("Error stopping http: {}", e);
            exit_code = 1;
        }

        let supervisor = self.supervisor_handle.take();
        if let Err(e) = self.stop_component("supervisor", supervisor).await {
            error!("Error stopping supervisor: {}", e);
            exit_code = 1;
        }

        let upload = self.upload_handle.take();
        if let Err(e) = self.stop_component("upload", upload).await {
            error!("Error stopping upload: {}", e);
            exit_code = 1;
        }

        let capture = self.capture_handle.take();
        if let Err(e) = self.stop_component("capture", capture).await {
            error!("Error stopping capture: {}", e);
            exit_code = 1;
        }

        // Dropping the advertiser unregisters the mDNS service, if any.
        self.service_advertiser = None;

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn stop_component(&self, component: &str, handle: Option<JoinHandle<()>>) -> Result<()> {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping).await;

        let Some(handle) = handle else {
            self.set_component_state(component, ComponentState::Stopped).await;
            return Ok(());
        };

        match timeout(COMPONENT_STOP_TIMEOUT, handle).await {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped).await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed).await;
                Err(PenareiaError::component(component.to_string(), format!("task panicked: {e}")))
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed).await;
                error!("{} component stop timeout", component);
                Err(PenareiaError::component(component.to_string(), "stop timeout".to_string()))
            }
        }
    }
}
