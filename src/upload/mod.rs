//! Dequeues journal entries, verifies integrity, uploads with bounded
//! retries, and fires a best-effort webhook on success (SPEC_FULL.md §4.F).

pub mod object_store;
pub mod webhook;
pub mod worker;

pub use object_store::{BackblazeB2Client, MockObjectStoreClient, ObjectStoreClient, UploadedObject};
pub use webhook::WebhookNotifier;
pub use worker::UploadWorker;
