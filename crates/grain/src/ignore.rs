//! Ignore filter for snapshot tracking
//!
//! A grain is excluded from every tracking operation when:
//! 1. Its id is listed
//! 2. Its parent's id is listed
//! 3. A type constraint matches its type id or type name

use crate::grain::{Grain, GrainId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Excludes grains of a given type (by id, by name, or both)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeConstraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_def_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl TypeConstraint {
    pub fn by_id(type_def_id: Uuid) -> Self {
        Self {
            type_def_id: Some(type_def_id),
            type_name: None,
        }
    }

    pub fn by_name(type_name: impl Into<String>) -> Self {
        Self {
            type_def_id: None,
            type_name: Some(type_name.into()),
        }
    }

    fn matches(&self, grain: &Grain) -> bool {
        let id_match = matches!(
            (self.type_def_id, grain.type_def_id),
            (Some(want), Some(have)) if want == have
        );
        let name_match = match (&self.type_name, &grain.type_name) {
            (Some(want), Some(have)) => want == have,
            _ => false,
        };
        id_match || name_match
    }
}

/// Set of ignore constraints persisted next to the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreFilter {
    #[serde(default)]
    pub ids: BTreeSet<GrainId>,
    #[serde(default)]
    pub types: Vec<TypeConstraint>,
}

impl IgnoreFilter {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.types.is_empty()
    }

    /// Check if a grain should be excluded
    pub fn is_ignored(&self, grain: &Grain) -> bool {
        if self.ids.contains(&grain.id) {
            return true;
        }
        if let Some(parent) = grain.parent_id {
            if self.ids.contains(&parent) {
                return true;
            }
        }
        self.types.iter().any(|constraint| constraint.matches(grain))
    }
}
