//! Decisions on grains changed both locally and on the broker

use grain::{Grain, GrainId};

/// A grain modified on both sides since the last pull
#[derive(Debug, Clone)]
pub struct Conflict {
    pub local: Grain,
    pub broker: Grain,
}

impl Conflict {
    pub fn id(&self) -> GrainId {
        self.broker.id
    }

    pub fn path(&self) -> &str {
        self.broker.display_path()
    }
}

/// Outcome of one conflict prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Keep the cached copy, stamped with the broker's modification time
    KeepLocal,
    /// Overwrite the cached copy with the broker version
    AcceptBroker,
    /// Park the broker version in a side file, cached copy untouched
    SaveSideFile,
    /// Show both versions, then ask again
    ShowDiff,
}

/// Called synchronously by pull for every two-sided conflict
pub trait ConflictResolver {
    fn resolve(&mut self, conflict: &Conflict) -> Resolution;

    fn show_diff(&mut self, conflict: &Conflict);
}
