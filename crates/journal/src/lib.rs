//! Checkpoint log for snapshot synchronization
//!
//! This crate provides:
//! - Checkpoint records (ordinal, broker instance, watermark, change sets)
//! - Append-only checkpoint store (one JSON file per ordinal)
//! - Conflation of a checkpoint range into one change set
//! - JSON serialization settings shared by every snapshot file

pub mod checkpoint;
pub mod conflate;
pub mod error;
pub mod format;
pub mod store;

// Re-exports
pub use checkpoint::{Checkpoint, OLDEST_ORDINAL};
pub use conflate::conflate;
pub use error::JournalError;
pub use format::JsonFormat;
pub use store::CheckpointStore;

/// Result type for journal operations
pub type Result<T> = std::result::Result<T, JournalError>;
