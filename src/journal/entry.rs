//! Durable record type for a queued upload (SPEC_FULL.md §3).

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Completed => "completed",
            EntryStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EntryStatus::Pending),
            "completed" => Some(EntryStatus::Completed),
            "failed" => Some(EntryStatus::Failed),
            _ => None,
        }
    }
}

/// One row of `journal_entries`. `id` is `None` until the row has been
/// inserted and assigned a rowid by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Option<i64>,
    pub filename: String,
    pub local_path: String,
    pub remote_path: String,
    pub timestamp: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub status: EntryStatus,
    pub error_message: Option<String>,
    pub file_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

impl JournalEntry {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, EntryStatus::Completed | EntryStatus::Failed)
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [EntryStatus::Pending, EntryStatus::Completed, EntryStatus::Failed] {
            assert_eq!(EntryStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_unknown_status_string_is_none() {
        assert_eq!(EntryStatus::from_str("bogus"), None);
    }
}
