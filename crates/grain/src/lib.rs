//! Grain records and tracking primitives
//!
//! This crate provides:
//! - The cached grain record (opaque beyond its identity and timestamps)
//! - Snapshot scope flags
//! - Ignore filter evaluation
//! - Per-grain tracking status

pub mod grain;
pub mod ignore;
pub mod scope;
pub mod status;

// Re-exports
pub use grain::{builtin_grains_mtime, Grain, GrainId, BUILTIN_GRAINS_MTIME_SECS};
pub use ignore::{IgnoreFilter, TypeConstraint};
pub use scope::{Scope, ScopeParseError};
pub use status::TrackingStatus;
