//! Snapshot tracking against a broker
//!
//! This crate provides:
//! - Snapshot directory (descriptor, local state, grain cache, checkpoint log)
//! - Broker and snapshot validation
//! - Operations: track, connect, logout, push, pull, sync, status, info, diff
//! - Pluggable conflict resolution for pull
//! - Result codes shared with the command line

pub mod directory;
pub mod error;
pub mod grains;
pub mod ops;
pub mod resolver;
pub mod snapshot;
pub mod validate;

// Re-exports
pub use directory::{Adopt, SnapshotDirectory, VcsFlavor};
pub use error::{ResultCode, TrackingError};
pub use grains::GrainFiles;
pub use resolver::{Conflict, ConflictResolver, Resolution};
pub use snapshot::{LocalState, Snapshot, SNAPSHOT_VERSION};
pub use validate::{validate_broker, validate_connection, validate_snapshot};

/// Result type for tracking operations
pub type Result<T> = std::result::Result<T, TrackingError>;
