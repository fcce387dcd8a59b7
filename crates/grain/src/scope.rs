//! Snapshot scope flags

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which part of the anchor's subtree a snapshot tracks
///
/// A small flag set. Serialized as `"Anchor|Children"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Scope(u8);

impl Scope {
    pub const NONE: Scope = Scope(0);
    pub const ANCHOR: Scope = Scope(0x01);
    pub const CHILDREN: Scope = Scope(0x10);
    pub const DESCENDANTS: Scope = Scope(0x20);
    pub const FAMILY: Scope = Scope(0x01 | 0x10);
    pub const RECURSIVE: Scope = Scope(0x01 | 0x20);

    const NAMED: [(&'static str, Scope); 3] = [
        ("Anchor", Scope::ANCHOR),
        ("Children", Scope::CHILDREN),
        ("Descendants", Scope::DESCENDANTS),
    ];

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Scope) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Scope) -> Scope {
        Scope(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether the anchor grain itself is tracked
    pub const fn includes_anchor(self) -> bool {
        self.contains(Scope::ANCHOR)
    }

    /// Whether listing must descend below direct children
    pub const fn is_recursive(self) -> bool {
        self.contains(Scope::DESCENDANTS)
    }
}

impl std::ops::BitOr for Scope {
    type Output = Scope;

    fn bitor(self, rhs: Scope) -> Scope {
        self.union(rhs)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect();
        f.write_str(&names.join("|"))
    }
}

/// Unrecognized scope name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid scope '{0}' (expected Anchor, Children, Descendants, Family or Recursive)")]
pub struct ScopeParseError(pub String);

impl FromStr for Scope {
    type Err = ScopeParseError;

    /// Accepts single names, the `Family`/`Recursive` combinations and
    /// `|`- or `,`-separated lists, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut scope = Scope::NONE;
        for part in s.split(['|', ',']).map(str::trim).filter(|p| !p.is_empty()) {
            let flag = match part.to_ascii_lowercase().as_str() {
                "none" => Scope::NONE,
                "anchor" => Scope::ANCHOR,
                "children" => Scope::CHILDREN,
                "descendants" => Scope::DESCENDANTS,
                "family" => Scope::FAMILY,
                "recursive" => Scope::RECURSIVE,
                _ => return Err(ScopeParseError(part.to_string())),
            };
            scope = scope | flag;
        }
        Ok(scope)
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
