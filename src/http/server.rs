//! Axum server exposing the Trigger and Status APIs (SPEC_FULL.md §4.H/§4.I).

use super::handlers::{landing_handler, status_handler, trigger_handler};
use crate::capture::CaptureSessionInfo;
use crate::clip::ClipWriter;
use crate::config::PenareiaConfig;
use crate::error::{PenareiaError, Result, StreamError};
use crate::ring_buffer::RingBuffer;
use crate::status::SystemStatus;
use crate::supervisor::HostTelemetry;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shared state every handler reads from. Cloned per-request by axum (all
/// fields are `Arc`s or cheap `Copy` data), mirroring the teacher's
/// `streaming::server::ServerState`.
#[derive(Clone)]
pub struct ServerState {
    pub ring: Arc<RingBuffer>,
    pub clip_writer: Arc<ClipWriter>,
    pub status: Arc<SystemStatus>,
    pub telemetry: Arc<Option<HostTelemetry>>,
    pub session: CaptureSessionInfo,
    pub config: Arc<PenareiaConfig>,
    pub transcoder_available: bool,
}

pub struct HttpServer {
    state: ServerState,
    bind_addr: String,
    shutdown: CancellationToken,
}

impl HttpServer {
    pub fn new(state: ServerState, host: &str, port: u16, shutdown: CancellationToken) -> Self {
        Self {
            state,
            bind_addr: format!("{host}:{port}"),
            shutdown,
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            .route("/", get(landing_handler))
            .route("/status", get(status_handler))
            .route("/trigger", post(trigger_handler))
            .with_state(self.state);

        info!("Starting HTTP server on {}", self.bind_addr);

        let listener = tokio::net::TcpListener::bind(&self.bind_addr)
            .await
            .map_err(|e| {
                PenareiaError::Stream(StreamError::BindFailed {
                    address: self.bind_addr.clone(),
                    source: e,
                })
            })?;

        info!("HTTP server listening on {}", self.bind_addr);

        let shutdown = self.shutdown;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| {
                PenareiaError::Stream(StreamError::StartupFailed {
                    details: format!("server error: {e}"),
                })
            })?;

        Ok(())
    }
}
