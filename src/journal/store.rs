//! Durable SQLite-backed upload queue (SPEC_FULL.md §4.E).
//!
//! Grounded on the pack's `scottlamb-moonfire-nvr` crate's use of `rusqlite`
//! for its own durable catalog; the teacher carries no SQL dependency, so this
//! is an enrichment import rather than a teacher pattern. Connections are
//! short-lived and per-operation, opened with a 10-second busy timeout and
//! `journal_mode=WAL`, and since `rusqlite` is synchronous, every operation
//! runs inside `tokio::task::spawn_blocking`.

use super::entry::{EntryStatus, JournalEntry, DEFAULT_MAX_ATTEMPTS};
use crate::error::{JournalError, PenareiaError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS journal_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    local_path TEXT NOT NULL,
    remote_path TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL DEFAULT 5,
    status TEXT NOT NULL DEFAULT 'pending',
    error_message TEXT,
    file_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Durable queue plus the in-memory work channel the Upload Worker drains.
pub struct JournalStore {
    db_path: PathBuf,
    work_tx: mpsc::UnboundedSender<JournalEntry>,
}

impl JournalStore {
    /// Open (creating if necessary) the store at `db_path`, returning the
    /// store and the receiving half of its work channel.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<(Self, mpsc::UnboundedReceiver<JournalEntry>)> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PenareiaError::Journal(JournalError::StoreOpen {
                    path: db_path.to_string_lossy().to_string(),
                    details: e.to_string(),
                })
            })?;
        }

        let conn = open_connection(&db_path)?;
        conn.execute_batch(SCHEMA).map_err(|e| {
            PenareiaError::Journal(JournalError::StoreOpen {
                path: db_path.to_string_lossy().to_string(),
                details: e.to_string(),
            })
        })?;

        let (work_tx, work_rx) = mpsc::unbounded_channel();
        info!("Journal store opened at {}", db_path.display());

        Ok((Self { db_path, work_tx }, work_rx))
    }

    fn connection(&self) -> Result<Connection> {
        open_connection(&self.db_path)
    }

    /// Insert a pending row for `local_path`, compute its content digest, and
    /// push it onto the work channel. `priority` only affects in-memory
    /// ordering among channel-resident entries, never durability.
    pub async fn enqueue(&self, local_path: String, remote_path: String, priority: bool) -> Result<JournalEntry> {
        let hash = hash_file(&local_path).await?;
        let db_path = self.db_path.clone();
        let filename = Path::new(&local_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| local_path.clone());

        let entry = tokio::task::spawn_blocking(move || -> Result<JournalEntry> {
            let conn = open_connection(&db_path)?;
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO journal_entries
                 (filename, local_path, remote_path, timestamp, attempts, max_attempts, status, error_message, file_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, 'pending', NULL, ?6, ?7, ?7)",
                params![filename, local_path, remote_path, now, DEFAULT_MAX_ATTEMPTS, hash, now],
            )
            .map_err(|e| PenareiaError::Journal(JournalError::EnqueueFailed { details: e.to_string() }))?;

            let id = conn.last_insert_rowid();
            fetch_by_id(&conn, id)
        })
        .await
        .map_err(|e| PenareiaError::Journal(JournalError::EnqueueFailed { details: e.to_string() }))??;

        // `priority` only affects in-memory ordering among channel-resident
        // entries; the channel is FIFO and unbounded, so both paths admit
        // immediately today. All rows are durable regardless of placement.
        let _ = priority;
        self.admit(entry.clone());

        Ok(entry)
    }

    /// Push an already-durable entry onto the work channel (used by
    /// `recover_pending` and by the worker's outer-retry re-admission).
    pub fn admit(&self, entry: JournalEntry) {
        if self.work_tx.send(entry).is_err() {
            warn!("Journal work channel has no receiver; entry dropped from memory (still durable)");
        }
    }

    pub async fn mark_completed(&self, id: i64, url: &str) -> Result<()> {
        let db_path = self.db_path.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = open_connection(&db_path)?;
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE journal_entries SET status = 'completed', error_message = ?1, updated_at = ?2 WHERE id = ?3",
                params![url, now, id],
            )
            .map_err(JournalError::from)?;
            Ok(())
        })
        .await
        .map_err(|e| PenareiaError::Journal(JournalError::EnqueueFailed { details: e.to_string() }))?
    }

    pub async fn mark_failed(&self, id: i64, reason: &str) -> Result<()> {
        let db_path = self.db_path.clone();
        let reason = reason.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = open_connection(&db_path)?;
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE journal_entries SET status = 'failed', error_message = ?1, updated_at = ?2 WHERE id = ?3",
                params![reason, now, id],
            )
            .map_err(JournalError::from)?;
            Ok(())
        })
        .await
        .map_err(|e| PenareiaError::Journal(JournalError::EnqueueFailed { details: e.to_string() }))?
    }

    /// Increment `attempts` on an entry, returning the new count.
    pub async fn increment_attempts(&self, id: i64) -> Result<u32> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<u32> {
            let conn = open_connection(&db_path)?;
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE journal_entries SET attempts = attempts + 1, updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )
            .map_err(JournalError::from)?;
            let attempts: u32 = conn
                .query_row("SELECT attempts FROM journal_entries WHERE id = ?1", params![id], |row| row.get(0))
                .map_err(JournalError::from)?;
            Ok(attempts)
        })
        .await
        .map_err(|e| PenareiaError::Journal(JournalError::EnqueueFailed { details: e.to_string() }))?
    }

    /// At startup, load all `pending` rows; re-admit those whose file still
    /// exists, mark the rest `failed("file not found on recovery")`.
    pub async fn recover_pending(&self) -> Result<(usize, usize)> {
        let db_path = self.db_path.clone();
        let pending = tokio::task::spawn_blocking(move || -> Result<Vec<JournalEntry>> {
            let conn = open_connection(&db_path)?;
            let mut stmt = conn
                .prepare("SELECT id, filename, local_path, remote_path, timestamp, attempts, max_attempts, status, error_message, file_hash, created_at, updated_at FROM journal_entries WHERE status = 'pending'")
                .map_err(JournalError::from)?;
            let rows = stmt
                .query_map([], row_to_entry)
                .map_err(JournalError::from)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(JournalError::from)?;
            Ok(rows)
        })
        .await
        .map_err(|e| PenareiaError::Journal(JournalError::EnqueueFailed { details: e.to_string() }))??;

        let mut re_admitted = 0;
        let mut failed = 0;
        for entry in pending {
            if std::path::Path::new(&entry.local_path).exists() {
                self.admit(entry);
                re_admitted += 1;
            } else {
                let id = entry.id.expect("recovered row always has an id");
                self.mark_failed(id, "file not found on recovery").await?;
                failed += 1;
            }
        }

        info!(
            "Journal recovery: {} entries re-admitted, {} marked failed (missing file)",
            re_admitted, failed
        );
        Ok((re_admitted, failed))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

fn open_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path).map_err(|e| {
        PenareiaError::Journal(JournalError::StoreOpen {
            path: db_path.to_string_lossy().to_string(),
            details: e.to_string(),
        })
    })?;
    conn.busy_timeout(BUSY_TIMEOUT).map_err(JournalError::from)?;
    conn.pragma_update(None, "journal_mode", "WAL").map_err(JournalError::from)?;
    Ok(conn)
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<JournalEntry> {
    let status_str: String = row.get(7)?;
    Ok(JournalEntry {
        id: Some(row.get(0)?),
        filename: row.get(1)?,
        local_path: row.get(2)?,
        remote_path: row.get(3)?,
        timestamp: row.get(4)?,
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        status: EntryStatus::from_str(&status_str).unwrap_or(EntryStatus::Failed),
        error_message: row.get(8)?,
        file_hash: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn fetch_by_id(conn: &Connection, id: i64) -> Result<JournalEntry> {
    conn.query_row(
        "SELECT id, filename, local_path, remote_path, timestamp, attempts, max_attempts, status, error_message, file_hash, created_at, updated_at FROM journal_entries WHERE id = ?1",
        params![id],
        row_to_entry,
    )
    .optional()
    .map_err(JournalError::from)?
    .ok_or(JournalError::NotFound { id })
    .map_err(PenareiaError::Journal)
}

/// Content digest used both at enqueue time and before upload, per the
/// integrity invariant.
pub async fn hash_file(path: &str) -> Result<String> {
    let path = path.to_string();
    tokio::task::spawn_blocking(move || -> Result<String> {
        let bytes = std::fs::read(&path)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    })
    .await
    .map_err(|e| PenareiaError::system(format!("hash task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    async fn sample_store() -> (JournalStore, mpsc::UnboundedReceiver<JournalEntry>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("queue.db");
        let (store, rx) = JournalStore::open(&db_path).unwrap();
        (store, rx, dir)
    }

    #[tokio::test]
    async fn test_enqueue_inserts_pending_and_admits_to_channel() {
        let (store, mut rx, dir) = sample_store().await;
        let clip_path = dir.path().join("clip.mp4");
        std::fs::File::create(&clip_path).unwrap().write_all(b"hello").unwrap();

        let entry = store
            .enqueue(clip_path.to_string_lossy().to_string(), "Penareia_x.mp4".to_string(), false)
            .await
            .unwrap();

        assert!(entry.id.is_some());
        assert_eq!(entry.status, EntryStatus::Pending);
        assert_eq!(entry.attempts, 0);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.local_path, clip_path.to_string_lossy().to_string());
    }

    #[tokio::test]
    async fn test_mark_completed_then_mark_failed_are_terminal() {
        let (store, _rx, dir) = sample_store().await;
        let clip_path = dir.path().join("clip.mp4");
        std::fs::File::create(&clip_path).unwrap().write_all(b"hello").unwrap();
        let entry = store
            .enqueue(clip_path.to_string_lossy().to_string(), "remote.mp4".to_string(), false)
            .await
            .unwrap();
        let id = entry.id.unwrap();

        store.mark_completed(id, "https://example.com/file/bucket/remote.mp4").await.unwrap();

        let (re_admitted, failed) = store.recover_pending().await.unwrap();
        assert_eq!(re_admitted, 0);
        assert_eq!(failed, 0);
    }

    #[tokio::test]
    async fn test_recover_pending_splits_present_and_missing_files() {
        let (store, mut rx, dir) = sample_store().await;

        let present = dir.path().join("present.mp4");
        std::fs::File::create(&present).unwrap().write_all(b"data").unwrap();
        store
            .enqueue(present.to_string_lossy().to_string(), "present.mp4".to_string(), false)
            .await
            .unwrap();
        rx.recv().await.unwrap(); // drain the first enqueue admission

        let missing = dir.path().join("missing.mp4");
        std::fs::File::create(&missing).unwrap().write_all(b"data").unwrap();
        store
            .enqueue(missing.to_string_lossy().to_string(), "missing.mp4".to_string(), false)
            .await
            .unwrap();
        rx.recv().await.unwrap();
        std::fs::remove_file(&missing).unwrap();

        let (re_admitted, failed) = store.recover_pending().await.unwrap();
        assert_eq!(re_admitted, 1);
        assert_eq!(failed, 1);
    }

    #[tokio::test]
    async fn test_increment_attempts_counts_up() {
        let (store, _rx, dir) = sample_store().await;
        let clip_path = dir.path().join("clip.mp4");
        std::fs::File::create(&clip_path).unwrap().write_all(b"hello").unwrap();
        let entry = store
            .enqueue(clip_path.to_string_lossy().to_string(), "remote.mp4".to_string(), false)
            .await
            .unwrap();
        let id = entry.id.unwrap();

        let attempts = store.increment_attempts(id).await.unwrap();
        assert_eq!(attempts, 1);
        let attempts = store.increment_attempts(id).await.unwrap();
        assert_eq!(attempts, 2);
    }
}
