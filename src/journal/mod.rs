//! Durable upload queue: entry schema plus the SQLite-backed store.

pub mod entry;
pub mod store;

pub use entry::{EntryStatus, JournalEntry, DEFAULT_MAX_ATTEMPTS};
pub use store::{hash_file, JournalStore};
