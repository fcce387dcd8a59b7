//! Per-grain tracking classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a grain relates to the checkpoint log on one side (local or broker)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackingStatus {
    #[default]
    Uptodate,
    Missing,
    /// Present on disk but neither added nor referenced by the log
    Obscure,
    Ignored,
    Modified,
    New,
    Deleted,
}

impl TrackingStatus {
    /// Single-character column used by status listings
    pub fn indicator(self) -> char {
        match self {
            TrackingStatus::Uptodate => ' ',
            TrackingStatus::Missing => '!',
            TrackingStatus::Obscure => 'O',
            TrackingStatus::Ignored => 'I',
            TrackingStatus::Modified => 'M',
            TrackingStatus::New => 'N',
            TrackingStatus::Deleted => 'D',
        }
    }

    pub fn is_uptodate(self) -> bool {
        self == TrackingStatus::Uptodate
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
