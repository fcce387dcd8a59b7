//! Committable snapshot descriptor and never-committed local state

use broker::{ConnectionSettings, Version};
use chrono::{DateTime, Utc};
use grain::{builtin_grains_mtime, GrainId, Scope};
use journal::Checkpoint;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Descriptor format written by this version
pub const SNAPSHOT_VERSION: Version = Version::new(0, 1, 0);

/// What is being tracked, shared through version control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<Version>,
    /// Ids from the tracked root down to the anchor (last)
    #[serde(default)]
    pub anchor: Vec<GrainId>,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default = "builtin_grains_mtime")]
    pub updated: DateTime<Utc>,
    /// Ordinal of the shared checkpoint
    #[serde(default)]
    pub checkpoint: u32,
}

impl Snapshot {
    pub fn new(scope: Scope, schema_version: Option<Version>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            schema_version,
            anchor: Vec::new(),
            scope,
            updated: Utc::now(),
            checkpoint: journal::OLDEST_ORDINAL,
        }
    }

    pub fn anchor_id(&self) -> Option<GrainId> {
        self.anchor.last().copied()
    }
}

const LOCAL_STATE_BANNER: &str = "Machine-local state, never commit this file";

fn banner() -> String {
    LOCAL_STATE_BANNER.to_string()
}

/// Connection and progress of this working copy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalState {
    #[serde(default = "banner")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionSettings>,
    pub instance_id: Uuid,
    #[serde(default)]
    pub last_push_checkpoint: u32,
    #[serde(default)]
    pub last_push_has_errors: bool,
    #[serde(default)]
    pub active_checkpoint: Checkpoint,
}

impl LocalState {
    /// State of a freshly connected working copy, watermark at `latest`
    pub fn new(instance_id: Uuid, latest: DateTime<Utc>) -> Self {
        Self {
            comment: banner(),
            connection: None,
            instance_id,
            last_push_checkpoint: 0,
            last_push_has_errors: false,
            active_checkpoint: Checkpoint::new(instance_id, 0, latest),
        }
    }
}
