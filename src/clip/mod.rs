//! Turns a trigger into a frozen, transcoded, journal-enqueued clip.

pub mod container;
pub mod writer;

pub use writer::{ClipOutcome, ClipWriter};
