use super::{ComponentState, Orchestrator};
use crate::discovery::ServiceAdvertiser;
use crate::error::{PenareiaError, Result};
use crate::http::{HttpServer, ServerState};
use crate::supervisor::{HostTelemetry, Supervisor};
use crate::upload::UploadWorker;
use std::process::Stdio;
use std::sync::Arc;
use tracing::{error, info};

impl Orchestrator {
    /// Recover durable journal state from a previous run and record initial
    /// component states.
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing Penareia components");

        let mut states = self.component_states.lock().await;
        states.insert("capture".to_string(), ComponentState::Stopped);
        states.insert("upload".to_string(), ComponentState::Stopped);
        states.insert("supervisor".to_string(), ComponentState::Stopped);
        states.insert("http".to_string(), ComponentState::Stopped);
        drop(states);

        let (re_admitted, failed) = self.journal.recover_pending().await?;
        info!(
            "Journal recovery on startup: {} entries re-admitted, {} marked failed",
            re_admitted, failed
        );

        info!("All components initialized successfully");
        Ok(())
    }

    /// Open the camera, then spawn the Capture Loop, Upload Worker,
    /// Supervisor, and HTTP server as independent tasks sharing one
    /// `CancellationToken`.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting Penareia capture daemon");

        self.set_component_state("capture", ComponentState::Starting).await;
        let mut capture_loop = self
            .capture_loop
            .take()
            .ok_or_else(|| PenareiaError::system("capture loop already started"))?;
        let session = capture_loop.establish_session().await.map_err(|e| {
            error!("Failed to open camera source: {}", e);
            e
        })?;
        self.session = Some(session);
        self.capture_handle = Some(tokio::spawn(async move {
            capture_loop.run().await;
        }));
        self.set_component_state("capture", ComponentState::Running).await;
        info!(
            "Capture session established: {}x{} @ {} fps",
            session.width, session.height, session.fps
        );

        self.set_component_state("upload", ComponentState::Starting).await;
        let work_rx = self
            .work_rx
            .take()
            .ok_or_else(|| PenareiaError::system("upload worker already started"))?;
        let webhook_notifier = self
            .webhook_notifier
            .take()
            .ok_or_else(|| PenareiaError::system("webhook notifier already started"))?;
        let webhook_tx = webhook_notifier.spawn();
        let upload_worker = UploadWorker::new(
            Arc::clone(&self.journal),
            Arc::clone(&self.object_store),
            webhook_tx,
            Arc::clone(&self.status),
            self.cancellation_token.clone(),
        );
        self.upload_handle = Some(tokio::spawn(upload_worker.run(work_rx)));
        self.set_component_state("upload", ComponentState::Running).await;

        self.set_component_state("supervisor", ComponentState::Starting).await;
        let supervisor = Supervisor::new(
            Arc::clone(&self.status),
            HostTelemetry::detect(),
            self.cancellation_token.clone(),
        );
        self.supervisor_handle = Some(tokio::spawn(supervisor.run()));
        self.set_component_state("supervisor", ComponentState::Running).await;

        if self.config.server.enable_mdns {
            self.service_advertiser = ServiceAdvertiser::advertise(&self.config.server.service_name, self.config.server.port);
        }

        self.set_component_state("http", ComponentState::Starting).await;
        let transcoder_available = detect_ffmpeg().await;
        let server_state = ServerState {
            ring: Arc::clone(&self.ring),
            clip_writer: Arc::clone(&self.clip_writer),
            status: Arc::clone(&self.status),
            telemetry: Arc::new(HostTelemetry::detect()),
            session,
            config: Arc::clone(&self.config),
            transcoder_available,
        };
        let http_server = HttpServer::new(
            server_state,
            &self.config.server.host,
            self.config.server.port,
            self.cancellation_token.clone(),
        );
        self.http_handle = Some(tokio::spawn(async move {
            if let Err(e) = http_server.start().await {
                error!("HTTP server error: {}", e);
            }
        }));
        self.set_component_state("http", ComponentState::Running).await;

        info!("Penareia capture daemon started successfully");
        Ok(())
    }
}

/// Cheap startup probe for the external encoder binary, surfaced on
/// `/status` as `transcoder_available`.
async fn detect_ffmpeg() -> bool {
    tokio::task::spawn_blocking(|| {
        std::process::Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    })
    .await
    .unwrap_or(false)
}
