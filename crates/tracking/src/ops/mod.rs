//! Snapshot operations, one module per command
//!
//! Operations report what they did through outcome values and log through
//! `tracing`; printing is left to the caller.

pub mod connect;
pub mod diff;
pub mod info;
pub mod pull;
pub mod push;
pub mod status;
pub mod sync;
pub mod track;

pub use connect::{connect, logout};
pub use diff::{load_diff, render, DiffMode, DiffSide, DiffSource, GrainDiff};
pub use info::{info, ConnectionInfo, InfoReport, SyncInfo};
pub use pull::{pull, PullOptions, PullOutcome};
pub use push::{push, PushOptions, PushOutcome, PushStatus};
pub use status::{status, StatusEntry, StatusOptions, StatusReport};
pub use sync::{sync, SyncOutcome};
pub use track::{track, AnchorRef, TrackOptions, TrackOutcome};
