use std::path::PathBuf;
use thiserror::Error;

/// Checkpoint log failures
///
/// Apart from `NotFound`, these indicate a corrupted or misused snapshot
/// directory and abort the current command.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("checkpoint {ordinal} not found at {}", path.display())]
    NotFound { ordinal: u32, path: PathBuf },

    #[error("checkpoint file {} records ordinal {found}, expected {requested}", path.display())]
    OrdinalMismatch {
        requested: u32,
        found: u32,
        path: PathBuf,
    },

    #[error("checkpoint ordinal must be at least 1")]
    InvalidOrdinal,

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl JournalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JournalError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        JournalError::Json {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, JournalError::NotFound { .. })
    }
}
