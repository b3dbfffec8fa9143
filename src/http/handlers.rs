use super::server::ServerState;
use crate::error::{CaptureError, PenareiaError};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde_json::json;
use tracing::{error, info};

/// `POST /trigger` — orchestrates Clip Writer → Transcoder → Journal enqueue
/// (SPEC_FULL.md §4.H). Never awaits upload completion.
pub async fn trigger_handler(State(state): State<ServerState>) -> impl IntoResponse {
    info!("Trigger received");

    match state.clip_writer.write_triggered_clip().await {
        Ok(outcome) => {
            state.status.record_capture();
            info!("Trigger succeeded: {}", outcome.arquivo);
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": "Clip capturado e enfileirado para upload",
                    "arquivo": outcome.arquivo,
                    "conversao": outcome.conversao,
                })),
            )
        }
        Err(PenareiaError::Capture(CaptureError::InsufficientStorage { available_bytes, required_bytes })) => {
            error!(
                "Trigger failed: insufficient storage ({} available, {} required)",
                available_bytes, required_bytes
            );
            (
                StatusCode::from_u16(507).expect("507 is a valid HTTP status code"),
                Json(json!({
                    "success": false,
                    "message": "Espaço em disco insuficiente",
                    "arquivo": serde_json::Value::Null,
                    "conversao": false,
                    "error": "InsufficientStorage",
                })),
            )
        }
        Err(PenareiaError::Capture(CaptureError::BufferEmpty)) => {
            error!("Trigger failed: buffer empty");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Nenhum frame disponível no buffer!",
                    "arquivo": serde_json::Value::Null,
                    "conversao": false,
                    "error": "Nenhum frame disponível no buffer!",
                })),
            )
        }
        Err(e) => {
            error!("Trigger failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Falha ao capturar o clipe",
                    "arquivo": serde_json::Value::Null,
                    "conversao": false,
                    "error": e.to_string(),
                })),
            )
        }
    }
}

/// `GET /status` — read-only snapshot (SPEC_FULL.md §4.I).
pub async fn status_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let ring_len = state.ring.len().await;
    let status = state.status.snapshot();
    let telemetry = state.telemetry.as_ref().as_ref().map(|t| {
        let sample = t.sample();
        json!({
            "cpu_percent": sample.cpu_percent,
            "memory_used_bytes": sample.memory_used_bytes,
            "memory_total_bytes": sample.memory_total_bytes,
        })
    });

    let body = json!({
        "source": state.config.video.source,
        "fps": state.session.fps,
        "width": state.session.width,
        "height": state.session.height,
        "buffer_seconds": state.config.video.buffer_seconds,
        "save_seconds": state.config.video.save_seconds,
        "ring_length": ring_len,
        "webhook_url": state.config.webhook.url,
        "bucket": state.config.backblaze_b2.bucket_name,
        "transcoder_available": state.transcoder_available,
        "uptime_seconds": status.uptime_seconds,
        "captures": status.captures,
        "uploads_success": status.uploads_success,
        "uploads_failed": status.uploads_failed,
        "crashes": status.crashes,
        "telemetry": telemetry,
    });

    (StatusCode::OK, Json(body))
}

/// `GET /` — small human-readable landing page, mirroring the teacher's
/// `stream_page_handler`.
pub async fn landing_handler() -> impl IntoResponse {
    Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Penareia</title>
    <style>
        body { font-family: system-ui, sans-serif; background: #10141a; color: #e6e6e6; margin: 2rem; }
        code { background: #1d2430; padding: 0.15rem 0.4rem; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>Penareia</h1>
    <p>Pre-roll video capture daemon.</p>
    <ul>
        <li><code>POST /trigger</code> — save the last N seconds</li>
        <li><code>GET /status</code> — read-only system snapshot</li>
    </ul>
</body>
</html>
"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureSessionInfo;
    use crate::clip::ClipWriter;
    use crate::config::{PenareiaConfig, VideoEncodingConfig};
    use crate::journal::JournalStore;
    use crate::ring_buffer::RingBuffer;
    use crate::status::SystemStatus;
    use crate::transcode::TranscoderAdapter;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn sample_config() -> PenareiaConfig {
        toml::from_str(
            r#"
            [video]
            source = "0"
            buffer_seconds = 30
            save_seconds = 10
            [webhook]
            url = "https://example.com/hook"
            [backblaze_b2]
            key_id = "k"
            application_key = "s"
            bucket_name = "bucket"
            [server]
            host = "0.0.0.0"
            port = 5000
            [video_encoding]
            codec = "libx264"
            audio_codec = "aac"
            preset = "veryfast"
            crf = 23
            pixel_format = "yuv420p"
        "#,
        )
        .unwrap()
    }

    async fn sample_state() -> (ServerState, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let ring = Arc::new(RingBuffer::new(240));
        let (journal, _rx) = JournalStore::open(dir.path().join("queue.db")).unwrap();
        let encoding = VideoEncodingConfig {
            codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            pixel_format: "yuv420p".to_string(),
            tune: None,
            threads: 2,
            use_gpu: false,
        };
        let clip_writer = Arc::new(ClipWriter::new(
            Arc::clone(&ring),
            TranscoderAdapter::new(),
            Arc::new(journal),
            encoding,
            10,
            24,
            640,
            480,
        ));

        let state = ServerState {
            ring,
            clip_writer,
            status: Arc::new(SystemStatus::new()),
            telemetry: Arc::new(None),
            session: CaptureSessionInfo { width: 640, height: 480, fps: 24 },
            config: Arc::new(sample_config()),
            transcoder_available: true,
        };
        (state, dir)
    }

    #[tokio::test]
    async fn test_trigger_on_empty_buffer_returns_500_with_portuguese_message() {
        let (state, _dir) = sample_state().await;
        let response = trigger_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_status_reports_ring_length_and_session() {
        use crate::frame::FrameData;
        use std::time::SystemTime;

        let (state, _dir) = sample_state().await;
        for i in 0..5u64 {
            state.ring.append(FrameData::new(i, SystemTime::now(), vec![0u8; 4], 640, 480)).await;
        }
        let response = status_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_landing_page_serves_html() {
        let response = landing_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
