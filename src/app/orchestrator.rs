use super::types::ComponentState;
use crate::capture::{self, CaptureLoop, CaptureSessionInfo, FfmpegCameraSource};
use crate::clip::ClipWriter;
use crate::config::PenareiaConfig;
use crate::discovery::ServiceAdvertiser;
use crate::error::Result;
use crate::journal::{JournalEntry, JournalStore};
use crate::paths;
use crate::ring_buffer::RingBuffer;
use crate::status::SystemStatus;
use crate::transcode::TranscoderAdapter;
use crate::upload::{BackblazeB2Client, ObjectStoreClient, WebhookNotifier};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Coordinates every long-lived piece of the daemon: the Capture Loop, Upload
/// Worker, Supervisor, and HTTP server, plus the durable state (Ring, Journal)
/// they share. Startup, run, and shutdown are split into sibling submodules;
/// one `CancellationToken` drives shutdown for every spawned task.
pub struct Orchestrator {
    pub(super) config: Arc<PenareiaConfig>,
    pub(super) ring: Arc<RingBuffer>,
    pub(super) journal: Arc<JournalStore>,
    pub(super) status: Arc<SystemStatus>,
    pub(super) clip_writer: Arc<ClipWriter>,
    pub(super) object_store: Arc<dyn ObjectStoreClient>,

    // Taken by `start()`, which moves each into its own spawned task.
    pub(super) capture_loop: Option<CaptureLoop<FfmpegCameraSource>>,
    pub(super) work_rx: Option<mpsc::UnboundedReceiver<JournalEntry>>,
    pub(super) webhook_notifier: Option<WebhookNotifier>,
    pub(super) service_advertiser: Option<ServiceAdvertiser>,
    pub(super) session: Option<CaptureSessionInfo>,

    pub(super) capture_handle: Option<JoinHandle<()>>,
    pub(super) upload_handle: Option<JoinHandle<()>>,
    pub(super) supervisor_handle: Option<JoinHandle<()>>,
    pub(super) http_handle: Option<JoinHandle<()>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<super::types::ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<super::types::ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl Orchestrator {
    /// Build every component from `config` without opening the camera or
    /// binding the HTTP server — those happen in `start()`.
    pub fn new(config: PenareiaConfig) -> Result<Self> {
        Self::new_with_journal_path(config, paths::journal_db_path())
    }

    /// `new()` fixed to an explicit journal path, used by tests so they
    /// don't contend over the real deployment path in `paths::journal_db_path()`.
    pub(super) fn new_with_journal_path<P: AsRef<std::path::Path>>(config: PenareiaConfig, journal_path: P) -> Result<Self> {
        config.validate()?;

        let status = Arc::new(SystemStatus::new());

        let ring_capacity = capture::ring_capacity(config.video.buffer_seconds, config.video.force_fps);
        let ring = Arc::new(RingBuffer::new(ring_capacity));

        let (journal, work_rx) = JournalStore::open(journal_path)?;
        let journal = Arc::new(journal);

        let clip_writer = Arc::new(ClipWriter::new(
            Arc::clone(&ring),
            TranscoderAdapter::new(),
            Arc::clone(&journal),
            config.video_encoding.clone(),
            config.video.save_seconds,
            config.video.force_fps,
            config.video.max_width,
            config.video.max_height,
        ));

        let cancellation_token = CancellationToken::new();

        let camera = FfmpegCameraSource::new(
            config.video_source(),
            config.video.force_fps,
            config.video.max_width,
            config.video.max_height,
        );
        let capture_loop = CaptureLoop::new(
            camera,
            Arc::clone(&ring),
            config.video.force_fps,
            status.heartbeat.clone(),
            cancellation_token.clone(),
        );

        let object_store: Arc<dyn ObjectStoreClient> = Arc::new(BackblazeB2Client::new(&config.backblaze_b2));
        let webhook_notifier = WebhookNotifier::new(config.webhook.url.clone());

        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config: Arc::new(config),
            ring,
            journal,
            status,
            clip_writer,
            object_store,
            capture_loop: Some(capture_loop),
            work_rx: Some(work_rx),
            webhook_notifier: Some(webhook_notifier),
            service_advertiser: None,
            session: None,
            capture_handle: None,
            upload_handle: None,
            supervisor_handle: None,
            http_handle: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token,
        })
    }
}
