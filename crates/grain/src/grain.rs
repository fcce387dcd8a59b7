//! Grain record as cached in a snapshot directory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Grain identifier
pub type GrainId = Uuid;

/// Modification time stamped on content that ships with every broker instance
/// (2024-01-05T00:00:11Z), in Unix seconds.
pub const BUILTIN_GRAINS_MTIME_SECS: i64 = 1_704_412_811;

/// Modification time stamped on content that ships with every broker instance.
///
/// Anything newer than this was created or touched after installation.
pub fn builtin_grains_mtime() -> DateTime<Utc> {
    DateTime::from_timestamp(BUILTIN_GRAINS_MTIME_SECS, 0).unwrap_or_default()
}

/// A single broker-hosted object
///
/// Only identity, placement, type and modification time are interpreted.
/// Everything else the broker sends (ACLs, localized layers, content) is kept
/// verbatim in `extra` so that cached files round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grain {
    pub id: GrainId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<GrainId>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default = "default_mtime")]
    pub m_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_def_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_mtime() -> DateTime<Utc> {
    builtin_grains_mtime()
}

impl Grain {
    /// Create a bare grain (mostly useful for placeholders and tests)
    pub fn new(id: GrainId, name: impl Into<String>, m_time: DateTime<Utc>) -> Self {
        Self {
            id,
            parent_id: None,
            name: name.into(),
            path: None,
            m_time,
            type_def_id: None,
            type_name: None,
            extra: Map::new(),
        }
    }

    /// Placeholder for a grain known only by id (e.g. deleted on both sides)
    pub fn deleted_placeholder(id: GrainId) -> Self {
        let mut grain = Self::new(id, format!("Deleted-{id}"), DateTime::<Utc>::default());
        grain.path = Some("~".to_string());
        grain
    }

    /// Path for display purposes
    pub fn display_path(&self) -> &str {
        self.path.as_deref().unwrap_or("/")
    }

    /// Prefix that every sibling's path starts with
    ///
    /// `"/root/a/b"` yields `"/root/a/"`; a path without separators yields `""`.
    pub fn parent_path_prefix(&self) -> Option<&str> {
        let path = self.path.as_deref()?;
        match path.rfind('/') {
            Some(idx) => Some(&path[..=idx]),
            None => Some(""),
        }
    }

    /// Whether this grain's path lies under the given prefix
    pub fn is_under(&self, prefix: &str) -> bool {
        match self.path.as_deref() {
            Some(path) if !path.is_empty() => path.starts_with(prefix),
            _ => false,
        }
    }
}
