//! Checkpoint data structures

use chrono::{DateTime, Utc};
use grain::{builtin_grains_mtime, GrainId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// First ordinal of every checkpoint log
pub const OLDEST_ORDINAL: u32 = 1;

/// A contiguous slice of change history
///
/// Written once per ordinal; later changes allocate a new ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Position in the log (0 = unset)
    #[serde(default)]
    pub ordinal: u32,
    /// Broker instance this slice applies to
    #[serde(default)]
    pub instance_id: Uuid,
    /// Highest grain modification time seen in this slice
    #[serde(default = "builtin_grains_mtime")]
    pub latest: DateTime<Utc>,
    #[serde(default)]
    pub modifications: BTreeSet<GrainId>,
    #[serde(default)]
    pub deletions: BTreeSet<GrainId>,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new(Uuid::nil(), 0, builtin_grains_mtime())
    }
}

impl Checkpoint {
    /// Create an empty checkpoint
    pub fn new(instance_id: Uuid, ordinal: u32, latest: DateTime<Utc>) -> Self {
        Self {
            ordinal,
            instance_id,
            latest,
            modifications: BTreeSet::new(),
            deletions: BTreeSet::new(),
        }
    }

    /// Optimistic concurrency test: same instance, ordinal and watermark
    ///
    /// Change sets are deliberately not compared.
    pub fn same_as(&self, other: &Checkpoint) -> bool {
        self.instance_id == other.instance_id
            && self.ordinal == other.ordinal
            && self.latest == other.latest
    }

    /// Record a stored or updated grain, advancing the watermark
    pub fn record_modification(&mut self, id: GrainId, m_time: DateTime<Utc>) {
        self.deletions.remove(&id);
        self.modifications.insert(id);
        if m_time > self.latest {
            self.latest = m_time;
        }
    }

    /// Record a deleted grain
    pub fn record_deletion(&mut self, id: GrainId) {
        self.modifications.remove(&id);
        self.deletions.insert(id);
    }

    /// Drop every reference to a grain
    pub fn forget(&mut self, id: &GrainId) -> bool {
        let modified = self.modifications.remove(id);
        let deleted = self.deletions.remove(id);
        modified || deleted
    }

    /// Fold a later checkpoint into this one
    ///
    /// Later deletions override earlier modifications; the ordinal and
    /// watermark of `later` are adopted.
    pub fn absorb(&mut self, later: &Checkpoint) {
        self.modifications.extend(later.modifications.iter().copied());
        for id in &later.deletions {
            self.modifications.remove(id);
        }
        self.deletions.extend(later.deletions.iter().copied());
        self.ordinal = later.ordinal;
        self.latest = later.latest;
    }

    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty() && self.deletions.is_empty()
    }
}
