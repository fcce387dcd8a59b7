//! Append-only checkpoint store, one JSON file per ordinal

use crate::checkpoint::Checkpoint;
use crate::error::JournalError;
use crate::format::JsonFormat;
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const FILE_PREFIX: &str = ".granary-checkpoint-";
const FILE_SUFFIX: &str = ".json";

/// Checkpoint files inside a snapshot directory
///
/// Ordinals are zero-padded so directory listings sort in load order.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    format: JsonFormat,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, format: JsonFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for an ordinal
    pub fn file_name(ordinal: u32) -> String {
        format!("{FILE_PREFIX}{ordinal:08}{FILE_SUFFIX}")
    }

    /// Ordinal encoded in a file name, if it is a checkpoint file
    pub fn parse_file_name(name: &str) -> Option<u32> {
        name.strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_SUFFIX)?
            .parse()
            .ok()
    }

    pub fn path_for(&self, ordinal: u32) -> PathBuf {
        self.dir.join(Self::file_name(ordinal))
    }

    /// Persist a checkpoint under its own ordinal
    pub fn store(&self, checkpoint: &Checkpoint) -> Result<()> {
        if checkpoint.ordinal == 0 {
            return Err(JournalError::InvalidOrdinal);
        }
        let path = self.path_for(checkpoint.ordinal);
        self.format.write_file(&path, checkpoint)?;
        debug!(
            ordinal = checkpoint.ordinal,
            modifications = checkpoint.modifications.len(),
            deletions = checkpoint.deletions.len(),
            "Stored checkpoint"
        );
        Ok(())
    }

    /// Load a checkpoint, verifying the ordinal it records
    pub fn load(&self, ordinal: u32) -> Result<Checkpoint> {
        if ordinal == 0 {
            return Err(JournalError::InvalidOrdinal);
        }
        let path = self.path_for(ordinal);
        if !path.is_file() {
            return Err(JournalError::NotFound { ordinal, path });
        }

        let checkpoint: Checkpoint = self.format.read_file(&path)?;
        if checkpoint.ordinal != ordinal {
            return Err(JournalError::OrdinalMismatch {
                requested: ordinal,
                found: checkpoint.ordinal,
                path,
            });
        }
        Ok(checkpoint)
    }

    pub fn exists(&self, ordinal: u32) -> bool {
        ordinal > 0 && self.path_for(ordinal).is_file()
    }

    /// All stored ordinals, ascending
    pub fn list_ordinals(&self) -> Result<Vec<u32>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ordinals = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.dir).to_path_buf();
                JournalError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(ordinal) = entry.file_name().to_str().and_then(Self::parse_file_name) {
                ordinals.push(ordinal);
            }
        }
        ordinals.sort_unstable();
        Ok(ordinals)
    }

    /// Every stored checkpoint in ordinal order
    pub fn list_all(&self) -> Result<Vec<Checkpoint>> {
        self.list_ordinals()?
            .into_iter()
            .map(|ordinal| self.load(ordinal))
            .collect()
    }

    /// Remove every checkpoint file (used when initialization is rolled back)
    pub fn remove_all(&self) -> Result<usize> {
        let ordinals = self.list_ordinals()?;
        for &ordinal in &ordinals {
            let path = self.path_for(ordinal);
            std::fs::remove_file(&path).map_err(|e| JournalError::io(path, e))?;
        }
        Ok(ordinals.len())
    }
}
