//! Wire models exchanged with the broker

use chrono::{DateTime, Utc};
use grain::GrainId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Three-part dotted version (`0.1.19`)
///
/// A trailing fourth component sent by some brokers is accepted and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() < 2 || parts.len() > 4 {
            return Err(format!("invalid version '{s}'"));
        }
        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| format!("invalid version component '{part}' in '{s}'"))?;
        }
        Ok(Version::new(numbers[0], numbers[1], numbers[2]))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Broker identity as reported by `SysInfo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    /// API version
    pub version: Version,
    pub schema_version: Version,
    pub instance_id: Uuid,
}

/// Authentication settings advertised by `SysInfo/AuthConfig`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// `Basic` or `OIDC`
    #[serde(default)]
    pub schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(default)]
    pub scopes: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_separator: Option<String>,
}

impl AuthConfig {
    pub fn basic() -> Self {
        Self {
            schema: "Basic".to_string(),
            ..Default::default()
        }
    }

    /// Enabled scopes joined with the advertised separator
    pub fn scope_string(&self) -> String {
        let separator = self.scope_separator.as_deref().unwrap_or(" ");
        self.scopes
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

/// How the broker treats grains it already has during an import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DuplicatesStrategy {
    /// Overwrite unless the broker copy is newer
    #[default]
    OverwriteSkipNewer,
    Merge,
    OverwriteAll,
    Skip,
}

impl fmt::Display for DuplicatesStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-item feedback severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    Trace,
    Debug,
    #[default]
    Information,
    Warning,
    Error,
    Critical,
}

impl Severity {
    const NAMES: [(&'static str, Severity); 6] = [
        ("Trace", Severity::Trace),
        ("Debug", Severity::Debug),
        ("Information", Severity::Information),
        ("Warning", Severity::Warning),
        ("Error", Severity::Error),
        ("Critical", Severity::Critical),
    ];

    fn from_index(index: u64) -> Option<Self> {
        Self::NAMES.get(index as usize).map(|(_, s)| *s)
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, s)| *s)
    }

    fn name(self) -> &'static str {
        Self::NAMES[self as usize].0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Severity {
    /// Accepts the level name or its numeric index
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Index(u64),
            Name(String),
        }

        let parsed = match Raw::deserialize(deserializer)? {
            Raw::Index(i) => Severity::from_index(i),
            Raw::Name(name) => Severity::from_name(&name),
        };
        parsed.ok_or_else(|| serde::de::Error::custom("unknown feedback severity"))
    }
}

/// One item of import feedback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(default)]
    pub feedback_type: Severity,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<GrainId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

impl Feedback {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            feedback_type: Severity::Information,
            message: message.into(),
            object_id: None,
            code: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.feedback_type > Severity::Warning
    }
}

/// Outcome of a bulk import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResults {
    #[serde(default)]
    pub imported_count: usize,
    #[serde(default)]
    pub deleted_count: usize,
    #[serde(default)]
    pub feedback: Vec<Feedback>,
}

impl ImportResults {
    /// Result reported when there was nothing to send
    pub fn nothing_to_export() -> Self {
        Self {
            feedback: vec![Feedback::info("Nothing to export")],
            ..Default::default()
        }
    }

    /// Any feedback at warning level or above
    pub fn has_warnings(&self) -> bool {
        self.feedback.iter().any(|f| f.feedback_type >= Severity::Warning)
    }

    /// Any feedback above warning level
    pub fn has_errors(&self) -> bool {
        self.feedback.iter().any(Feedback::is_error)
    }
}

/// Parameters of a grain listing under a root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub root: GrainId,
    pub recursive: bool,
    /// Only grains modified strictly after this instant
    pub modified_since: Option<DateTime<Utc>>,
    /// Only grains modified strictly before this instant
    pub modified_until: Option<DateTime<Utc>>,
    /// Prepend the root itself (subject to the same time window)
    pub include_root: bool,
}

impl ListQuery {
    pub fn children(root: GrainId) -> Self {
        Self {
            root,
            recursive: false,
            modified_since: None,
            modified_until: None,
            include_root: false,
        }
    }

    /// Whether a modification time falls inside the window
    pub fn accepts(&self, m_time: DateTime<Utc>) -> bool {
        self.modified_since.map_or(true, |since| m_time > since)
            && self.modified_until.map_or(true, |until| m_time < until)
    }
}

/// `{ success, yield }` response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(rename = "yield", default = "Option::default")]
    pub payload: Option<T>,
}

/// Body of `Transport/In`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImportRequest<'a, G: Serialize> {
    pub grains: &'a [G],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grains_to_delete: Option<Vec<GrainId>>,
    pub duplicates_handling: DuplicatesStrategy,
}
