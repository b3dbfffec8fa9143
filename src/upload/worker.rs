//! Single-threaded upload worker (SPEC_FULL.md §4.F).
//!
//! Dequeues journal entries from the work channel with a 5-second blocking
//! wait (so shutdown is observed promptly), verifies the file is present and
//! unmodified, then attempts delivery with up to 3 immediate sub-attempts
//! separated by exponential backoff (`2 * 2^k` seconds). Exhausting the inner
//! sub-attempts increments the entry's durable `attempts` counter and, unless
//! that reaches `max_attempts`, re-admits the entry after a 30-second outer
//! retry delay — a coarser tier above the inner backoff, grounded on the
//! `MystenLabs-sui` analytics uploader's `Backoff` helper in
//! `other_examples/.../store/uploader.rs`, generalized here to two retry
//! tiers instead of one.

use crate::journal::{hash_file, JournalEntry, JournalStore};
use crate::status::SystemStatus;
use crate::upload::object_store::ObjectStoreClient;
use crate::upload::webhook::WebhookNotification;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const INNER_SUB_ATTEMPTS: u32 = 3;
const OUTER_RETRY_DELAY: Duration = Duration::from_secs(30);
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct UploadWorker {
    journal: Arc<JournalStore>,
    object_store: Arc<dyn ObjectStoreClient>,
    webhook_tx: mpsc::Sender<WebhookNotification>,
    status: Arc<SystemStatus>,
    shutdown: CancellationToken,
}

impl UploadWorker {
    pub fn new(
        journal: Arc<JournalStore>,
        object_store: Arc<dyn ObjectStoreClient>,
        webhook_tx: mpsc::Sender<WebhookNotification>,
        status: Arc<SystemStatus>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            journal,
            object_store,
            webhook_tx,
            status,
            shutdown,
        }
    }

    /// Drain the work channel until shutdown is signaled.
    pub async fn run(self, mut work_rx: mpsc::UnboundedReceiver<JournalEntry>) {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let dequeued = tokio::select! {
                _ = self.shutdown.cancelled() => None,
                entry = tokio::time::timeout(DEQUEUE_TIMEOUT, work_rx.recv()) => entry.ok().flatten(),
            };

            let Some(entry) = dequeued else {
                continue;
            };

            if let Err(e) = self.process_entry(entry).await {
                error!("Upload worker failed processing entry: {}", e);
            }
        }
        info!("Upload worker shut down");
    }

    async fn process_entry(&self, entry: JournalEntry) -> crate::error::Result<()> {
        let id = entry.id.expect("dequeued entries always have an id");

        if !std::path::Path::new(&entry.local_path).exists() {
            warn!("Local file missing for entry {}: {}", id, entry.local_path);
            self.journal.mark_failed(id, "file not found").await?;
            self.status.record_upload_failed();
            return Ok(());
        }

        let current_hash = hash_file(&entry.local_path).await?;
        if current_hash != entry.file_hash {
            warn!("Integrity mismatch for entry {}: {}", id, entry.local_path);
            self.journal.mark_failed(id, "integrity mismatch").await?;
            self.status.record_upload_failed();
            return Ok(());
        }

        match self.upload_with_inner_backoff(&entry).await {
            Ok(public_url) => {
                if let Err(e) = tokio::fs::remove_file(&entry.local_path).await {
                    warn!("Failed to remove local file {} after upload: {}", entry.local_path, e);
                }
                self.journal.mark_completed(id, &public_url).await?;
                self.status.record_upload_success();

                let captured_at = entry.timestamp.parse::<chrono::DateTime<Utc>>().unwrap_or_else(|e| {
                    warn!("Entry {} has unparseable timestamp '{}': {}; using delivery time", id, entry.timestamp, e);
                    Utc::now()
                });
                let notification = WebhookNotification {
                    arquivo: entry.filename.clone(),
                    url: public_url,
                    captured_at,
                };
                if self.webhook_tx.send(notification).await.is_err() {
                    warn!("Webhook notifier channel closed; notification for {} dropped", entry.filename);
                }
                Ok(())
            }
            Err(e) => {
                warn!("All inner sub-attempts failed for entry {}: {}", id, e);
                let attempts = self.journal.increment_attempts(id).await?;

                if attempts >= entry.max_attempts {
                    self.journal.mark_failed(id, &e.to_string()).await?;
                    self.status.record_upload_failed();
                } else {
                    info!(
                        "Entry {} failed (attempt {}/{}), re-admitting after {}s outer retry delay",
                        id,
                        attempts,
                        entry.max_attempts,
                        OUTER_RETRY_DELAY.as_secs()
                    );
                    let journal = Arc::clone(&self.journal);
                    let mut retry_entry = entry;
                    retry_entry.attempts = attempts;
                    let shutdown = self.shutdown.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = shutdown.cancelled() => {}
                            _ = sleep(OUTER_RETRY_DELAY) => journal.admit(retry_entry),
                        }
                    });
                }
                Ok(())
            }
        }
    }

    /// Up to 3 immediate sub-attempts with exponential backoff (2s, 4s, 8s)
    /// between them.
    async fn upload_with_inner_backoff(&self, entry: &JournalEntry) -> crate::error::Result<String> {
        let mut last_err = None;
        for k in 0..INNER_SUB_ATTEMPTS {
            match self.object_store.upload(&entry.local_path, &entry.remote_path).await {
                Ok(uploaded) => return Ok(uploaded.public_url),
                Err(e) => {
                    warn!("Upload sub-attempt {}/{} failed for {}: {}", k + 1, INNER_SUB_ATTEMPTS, entry.filename, e);
                    last_err = Some(e);
                    if k + 1 < INNER_SUB_ATTEMPTS {
                        let backoff = Duration::from_secs(2u64 * 2u64.pow(k));
                        tokio::select! {
                            _ = self.shutdown.cancelled() => break,
                            _ = sleep(backoff) => {}
                        }
                    }
                }
            }
        }
        Err(last_err.expect("loop runs at least once"))
    }
}
