//! Cached grain files, one JSON file per grain id

use grain::{Grain, GrainId};
use journal::{JournalError, JsonFormat};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const GRAIN_PREFIX: &str = "grain-";
const GRAIN_SUFFIX: &str = ".json";
const SIDE_FILE_SUFFIX: &str = ".broker";

/// Grain cache of a snapshot directory
///
/// Cheap to clone so that writes can be handed to blocking workers.
#[derive(Debug, Clone)]
pub struct GrainFiles {
    dir: PathBuf,
    format: JsonFormat,
}

impl GrainFiles {
    pub fn new(dir: impl Into<PathBuf>, format: JsonFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(id: GrainId) -> String {
        format!("{GRAIN_PREFIX}{id}{GRAIN_SUFFIX}")
    }

    fn parse_file_name(name: &str) -> Option<GrainId> {
        name.strip_prefix(GRAIN_PREFIX)?
            .strip_suffix(GRAIN_SUFFIX)?
            .parse()
            .ok()
    }

    pub fn path_for(&self, id: GrainId) -> PathBuf {
        self.dir.join(Self::file_name(id))
    }

    /// Where a conflicting broker version is parked
    pub fn side_path_for(&self, id: GrainId) -> PathBuf {
        self.dir
            .join(format!("{}{SIDE_FILE_SUFFIX}", Self::file_name(id)))
    }

    pub fn write(&self, grain: &Grain, side_file: bool) -> journal::Result<PathBuf> {
        let path = if side_file {
            self.side_path_for(grain.id)
        } else {
            self.path_for(grain.id)
        };
        self.format.write_file(&path, grain)?;
        Ok(path)
    }

    /// `None` when no cached copy exists
    pub fn read(&self, id: GrainId) -> journal::Result<Option<Grain>> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Ok(None);
        }
        self.format.read_file(&path).map(Some)
    }

    pub fn exists(&self, id: GrainId) -> bool {
        self.path_for(id).is_file()
    }

    /// Remove the cached copy and any side file
    pub fn delete(&self, id: GrainId) -> journal::Result<bool> {
        let mut removed = false;
        for path in [self.path_for(id), self.side_path_for(id)] {
            match std::fs::remove_file(&path) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(JournalError::Io { path, source }),
            }
        }
        Ok(removed)
    }

    /// Ids of every cached grain, sorted
    pub fn list_ids(&self) -> journal::Result<Vec<GrainId>> {
        let mut ids = Vec::new();
        if !self.dir.is_dir() {
            return Ok(ids);
        }
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| JournalError::Io {
                path: self.dir.clone(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(Self::parse_file_name) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Every cached file the directory owns, side files included
    pub(crate) fn all_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_grain_file(path))
            .collect()
    }
}

fn is_grain_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| {
            name.starts_with(GRAIN_PREFIX)
                && (name.ends_with(GRAIN_SUFFIX)
                    || name.ends_with(&format!("{GRAIN_SUFFIX}{SIDE_FILE_SUFFIX}")))
        })
}
