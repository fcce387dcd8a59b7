//! JSON settings for every file a snapshot directory writes

use crate::error::JournalError;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Serialization settings, passed explicitly to whoever writes snapshot files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonFormat {
    /// Indent output (friendlier diffs when the directory is under VCS)
    pub pretty: bool,
}

impl Default for JsonFormat {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl JsonFormat {
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn to_string<T: Serialize + ?Sized>(&self, value: &T) -> serde_json::Result<String> {
        if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    }

    /// Write a value, replacing the target atomically
    pub fn write_file<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let text = self
            .to_string(value)
            .map_err(|e| JournalError::json(path, e))?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| JournalError::io(dir, e))?;
        tmp.write_all(text.as_bytes())
            .map_err(|e| JournalError::io(tmp.path(), e))?;
        tmp.persist(path)
            .map_err(|e| JournalError::io(path, e.error))?;
        Ok(())
    }

    pub fn read_file<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let text = std::fs::read_to_string(path).map_err(|e| JournalError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| JournalError::json(path, e))
    }
}
