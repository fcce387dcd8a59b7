//! Snapshot directory: metadata, checkpoint log and grain cache on disk
//!
//! Layout:
//! - `.granary-snapshot.json` - committable snapshot descriptor
//! - `.granary-local.json` - connection and progress, never committed
//! - `.granary-ignore.json` - ignore filter (absent when nothing is ignored)
//! - `.granary-checkpoint-NNNNNNNN.json` - one file per checkpoint ordinal
//! - `grain-{id}.json` - cached grains, `grain-{id}.json.broker` for parked conflicts
//!
//! The directory assumes exclusive access for the duration of one command.

use crate::error::TrackingError;
use crate::grains::GrainFiles;
use crate::snapshot::{LocalState, Snapshot, SNAPSHOT_VERSION};
use crate::Result;
use broker::ConnectionSettings;
use chrono::{DateTime, Utc};
use grain::{builtin_grains_mtime, Grain, GrainId, IgnoreFilter};
use journal::{conflate, Checkpoint, CheckpointStore, JsonFormat, OLDEST_ORDINAL};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SNAPSHOT_FILE: &str = ".granary-snapshot.json";
pub const LOCAL_STATE_FILE: &str = ".granary-local.json";
pub const IGNORE_FILE: &str = ".granary-ignore.json";
const GITIGNORE_FILE: &str = ".gitignore";

/// Version control the directory lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VcsFlavor {
    #[default]
    Git,
    None,
}

impl fmt::Display for VcsFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VcsFlavor::Git => "git",
            VcsFlavor::None => "none",
        })
    }
}

impl FromStr for VcsFlavor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "git" => Ok(VcsFlavor::Git),
            "none" => Ok(VcsFlavor::None),
            _ => Err(format!("unknown VCS flavor '{s}'")),
        }
    }
}

/// Which checkpoint becomes active after connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Adopt {
    /// Leave the local checkpoint untouched
    #[default]
    Keep,
    /// Take over the shared checkpoint
    Shared,
    /// Load and take over a specific ordinal
    Ordinal(u32),
}

impl Adopt {
    /// Command-line form: 0 keeps, -1 takes the shared checkpoint, N takes ordinal N
    pub fn from_arg(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Adopt::Keep),
            -1 => Ok(Adopt::Shared),
            n if n > 0 && n <= i64::from(u32::MAX) => Ok(Adopt::Ordinal(n as u32)),
            n => Err(TrackingError::Parameter(format!("invalid checkpoint to adopt: {n}"))),
        }
    }
}

pub struct SnapshotDirectory {
    path: PathBuf,
    format: JsonFormat,
    checkpoints: CheckpointStore,
    grains: GrainFiles,
    snapshot: Option<Snapshot>,
    local: Option<LocalState>,
    shared: Option<Checkpoint>,
    ignores: Option<IgnoreFilter>,
}

impl SnapshotDirectory {
    /// Handle on a directory without reading anything
    pub fn new(path: impl Into<PathBuf>, format: JsonFormat) -> Self {
        let path = path.into();
        Self {
            checkpoints: CheckpointStore::new(path.clone(), format),
            grains: GrainFiles::new(path.clone(), format),
            path,
            format,
            snapshot: None,
            local: None,
            shared: None,
            ignores: None,
        }
    }

    /// Open a directory and load whatever metadata it holds
    pub fn open(path: impl Into<PathBuf>, format: JsonFormat) -> Result<Self> {
        let mut dir = Self::new(path, format);
        dir.load_metadata()?;
        Ok(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> JsonFormat {
        self.format
    }

    pub fn grain_files(&self) -> &GrainFiles {
        &self.grains
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    // Readiness

    pub fn is_directory(&self) -> bool {
        self.path.is_dir()
    }

    pub fn has_snapshot(&self) -> bool {
        self.file(SNAPSHOT_FILE).is_file()
    }

    pub fn is_connected(&self) -> bool {
        self.file(LOCAL_STATE_FILE).is_file()
    }

    pub fn has_ignores(&self) -> bool {
        self.file(IGNORE_FILE).is_file()
    }

    /// Every file on disk agrees with what is loaded in memory
    pub fn is_ready(&self) -> bool {
        self.is_directory()
            && self.has_snapshot() == self.snapshot.is_some()
            && self.is_connected() == self.local.is_some()
            && self.has_ignores() == self.ignores.is_some()
    }

    // Accessors

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn snapshot_mut(&mut self) -> Option<&mut Snapshot> {
        self.snapshot.as_mut()
    }

    pub fn local_state(&self) -> Option<&LocalState> {
        self.local.as_ref()
    }

    pub fn local_state_mut(&mut self) -> Option<&mut LocalState> {
        self.local.as_mut()
    }

    pub fn ignores(&self) -> Option<&IgnoreFilter> {
        self.ignores.as_ref()
    }

    /// An empty filter removes the ignore file on the next store
    pub fn set_ignores(&mut self, filter: IgnoreFilter) {
        self.ignores = (!filter.is_empty()).then_some(filter);
    }

    pub fn connection(&self) -> Option<&ConnectionSettings> {
        self.local.as_ref().and_then(|local| local.connection.as_ref())
    }

    pub fn connection_mut(&mut self) -> Option<&mut ConnectionSettings> {
        self.local.as_mut().and_then(|local| local.connection.as_mut())
    }

    pub fn broker_instance_id(&self) -> Option<Uuid> {
        self.local.as_ref().map(|local| local.instance_id)
    }

    pub fn require_snapshot(&self) -> Result<&Snapshot> {
        self.snapshot
            .as_ref()
            .ok_or_else(|| TrackingError::state(&self.path, "no snapshot found"))
    }

    pub fn require_local(&self) -> Result<&LocalState> {
        self.local
            .as_ref()
            .ok_or_else(|| TrackingError::state(&self.path, "not connected to a broker"))
    }

    fn require_local_mut(&mut self) -> Result<&mut LocalState> {
        let path = self.path.clone();
        self.local
            .as_mut()
            .ok_or_else(|| TrackingError::state(path, "not connected to a broker"))
    }

    pub fn local_checkpoint(&self) -> Result<&Checkpoint> {
        self.require_local().map(|local| &local.active_checkpoint)
    }

    pub fn local_checkpoint_mut(&mut self) -> Result<&mut Checkpoint> {
        self.require_local_mut().map(|local| &mut local.active_checkpoint)
    }

    /// The checkpoint named by the snapshot, or the local one when not on disk
    pub fn shared_checkpoint(&self) -> Result<&Checkpoint> {
        match &self.shared {
            Some(shared) => Ok(shared),
            None => self.local_checkpoint(),
        }
    }

    /// Mutable shared checkpoint; only meaningful when it was loaded
    pub fn shared_checkpoint_mut(&mut self) -> Option<&mut Checkpoint> {
        self.shared.as_mut()
    }

    pub fn last_push_checkpoint(&self) -> u32 {
        self.local.as_ref().map_or(0, |local| local.last_push_checkpoint)
    }

    pub fn is_ignored(&self, grain: &Grain) -> bool {
        self.ignores
            .as_ref()
            .map_or(false, |filter| filter.is_ignored(grain))
    }

    // Metadata

    pub fn load_metadata(&mut self) -> Result<()> {
        self.snapshot = None;
        self.local = None;
        self.shared = None;
        self.ignores = None;
        if !self.is_directory() {
            return Ok(());
        }

        if self.has_snapshot() {
            let snapshot: Snapshot = self.format.read_file(&self.file(SNAPSHOT_FILE))?;
            if snapshot.version.major != SNAPSHOT_VERSION.major
                || snapshot.version.minor > SNAPSHOT_VERSION.minor
            {
                return Err(TrackingError::SnapshotVersion {
                    found: snapshot.version,
                    expected: SNAPSHOT_VERSION,
                });
            }
            if snapshot.checkpoint >= OLDEST_ORDINAL && self.checkpoints.exists(snapshot.checkpoint) {
                self.shared = Some(self.checkpoints.load(snapshot.checkpoint)?);
            }
            self.snapshot = Some(snapshot);
        }
        if self.is_connected() {
            self.local = Some(self.format.read_file(&self.file(LOCAL_STATE_FILE))?);
        }
        if self.has_ignores() {
            self.ignores = Some(self.format.read_file(&self.file(IGNORE_FILE))?);
        }
        debug!(
            path = %self.path.display(),
            snapshot = self.snapshot.is_some(),
            connected = self.local.is_some(),
            "Loaded snapshot metadata"
        );
        Ok(())
    }

    pub fn store_snapshot(&self) -> Result<()> {
        let snapshot = self.require_snapshot()?;
        self.format.write_file(&self.file(SNAPSHOT_FILE), snapshot)?;
        Ok(())
    }

    /// Persist local state, and the active checkpoint when asked
    ///
    /// Nothing is written for a disconnected directory.
    pub fn store_local_state(&mut self, include_checkpoint: bool) -> Result<()> {
        let Some(local) = &self.local else {
            return Ok(());
        };
        self.format.write_file(&self.file(LOCAL_STATE_FILE), local)?;
        if include_checkpoint && local.active_checkpoint.ordinal >= OLDEST_ORDINAL {
            let active = local.active_checkpoint.clone();
            self.store_checkpoint(active, false)?;
        }
        Ok(())
    }

    pub fn store_ignores(&self) -> Result<()> {
        let path = self.file(IGNORE_FILE);
        match &self.ignores {
            Some(filter) => self.format.write_file(&path, filter)?,
            None => remove_if_exists(&path)?,
        }
        Ok(())
    }

    pub fn store_metadata(&mut self, include_checkpoint: bool) -> Result<()> {
        self.store_snapshot()?;
        self.store_local_state(include_checkpoint)
    }

    // Lifecycle

    /// Set up a new snapshot in this directory
    pub fn initialize(
        &mut self,
        instance_id: Uuid,
        snapshot: Snapshot,
        vcs: VcsFlavor,
        connection: Option<ConnectionSettings>,
    ) -> Result<()> {
        if self.has_snapshot() {
            return Err(TrackingError::state(&self.path, "a snapshot already exists"));
        }
        std::fs::create_dir_all(&self.path).map_err(|e| TrackingError::io(&self.path, e))?;

        let mut local = LocalState::new(instance_id, snapshot.updated);
        local.connection = connection;
        local.active_checkpoint.ordinal = snapshot.checkpoint;
        local.last_push_checkpoint = snapshot.checkpoint;

        info!(path = %self.path.display(), instance = %instance_id, "Initializing snapshot");
        self.snapshot = Some(snapshot);
        self.local = Some(local);
        self.shared = None;
        self.write_vcs_hint(vcs)?;
        self.store_metadata(false)
    }

    /// Attach an existing snapshot to a broker
    pub fn connect(
        &mut self,
        connection: ConnectionSettings,
        instance_id: Uuid,
        adopt: Adopt,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if self.is_connected() {
            return Err(TrackingError::state(&self.path, "already connected"));
        }
        let snapshot = self
            .snapshot
            .as_mut()
            .ok_or_else(|| TrackingError::state(&self.path, "no snapshot found"))?;
        if let Some(timestamp) = timestamp {
            snapshot.updated = timestamp;
        }
        let ordinal = snapshot.checkpoint;
        let updated = snapshot.updated;
        debug!(
            path = %self.path.display(),
            instance = %instance_id,
            url = %connection.broker_url,
            "Connecting snapshot"
        );

        if ordinal >= OLDEST_ORDINAL && self.checkpoints.exists(ordinal) {
            if self.shared.is_none() {
                self.shared = Some(self.checkpoints.load(ordinal)?);
            }
        } else if ordinal >= OLDEST_ORDINAL {
            info!(ordinal, "Shared checkpoint not found, rebuilding it from cached grains");
            let mut shared = Checkpoint::new(instance_id, ordinal, builtin_grains_mtime());
            for grain in self.list_grains(None)? {
                shared.record_modification(grain.id, grain.m_time);
            }
            self.checkpoints.store(&shared)?;
            self.shared = Some(shared);
        }

        // A fresh working copy starts at the shared watermark, on no ordinal
        let watermark = self.shared.as_ref().map_or(updated, |shared| shared.latest);
        let mut local = self
            .local
            .take()
            .unwrap_or_else(|| LocalState::new(instance_id, watermark));
        local.instance_id = instance_id;
        local.connection = Some(connection);
        self.local = Some(local);

        self.adopt_checkpoint(adopt)?;
        self.store_local_state(adopt != Adopt::Keep)
    }

    /// Forget the broker connection; snapshot and cache stay
    pub fn disconnect(&mut self) -> Result<()> {
        self.local = None;
        remove_if_exists(&self.file(LOCAL_STATE_FILE))
    }

    /// Remove every file this directory wrote
    pub fn clean_up(&mut self) -> Result<()> {
        warn!(path = %self.path.display(), "Cleaning up snapshot directory");
        for name in [SNAPSHOT_FILE, LOCAL_STATE_FILE, IGNORE_FILE] {
            remove_if_exists(&self.file(name))?;
        }
        for path in self.grains.all_files() {
            remove_if_exists(&path)?;
        }
        self.checkpoints.remove_all()?;
        self.snapshot = None;
        self.local = None;
        self.shared = None;
        self.ignores = None;
        Ok(())
    }

    /// Keep the local state file out of version control
    pub fn write_vcs_hint(&self, vcs: VcsFlavor) -> Result<()> {
        match vcs {
            VcsFlavor::Git => {
                let path = self.file(GITIGNORE_FILE);
                let existing = std::fs::read_to_string(&path).unwrap_or_default();
                if existing.lines().any(|line| line.trim() == LOCAL_STATE_FILE) {
                    return Ok(());
                }
                let mut content = existing;
                if !content.is_empty() && !content.ends_with('\n') {
                    content.push('\n');
                }
                content.push_str(LOCAL_STATE_FILE);
                content.push('\n');
                std::fs::write(&path, content).map_err(|e| TrackingError::io(path, e))
            }
            VcsFlavor::None => Ok(()),
        }
    }

    // Checkpoints

    pub fn has_checkpoint(&self, ordinal: u32) -> bool {
        self.checkpoints.exists(ordinal)
    }

    pub fn load_checkpoint(&self, ordinal: u32) -> Result<Checkpoint> {
        Ok(self.checkpoints.load(ordinal)?)
    }

    pub fn list_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        Ok(self.checkpoints.list_all()?)
    }

    pub fn adopt_checkpoint(&mut self, adopt: Adopt) -> Result<()> {
        let adopted = match adopt {
            Adopt::Keep => return Ok(()),
            Adopt::Shared => self
                .shared
                .clone()
                .ok_or_else(|| TrackingError::state(&self.path, "no shared checkpoint to adopt"))?,
            Adopt::Ordinal(ordinal) => self.checkpoints.load(ordinal)?,
        };
        debug!(ordinal = adopted.ordinal, "Adopting checkpoint");
        self.local_checkpoint_mut().map(|active| *active = adopted)
    }

    /// Write a checkpoint under its ordinal
    ///
    /// `is_current` makes it the active checkpoint. A checkpoint carrying the
    /// snapshot's ordinal also becomes the shared one.
    pub fn store_checkpoint(&mut self, checkpoint: Checkpoint, is_current: bool) -> Result<()> {
        self.checkpoints.store(&checkpoint)?;
        if self.snapshot.as_ref().map(|s| s.checkpoint) == Some(checkpoint.ordinal) {
            self.shared = Some(checkpoint.clone());
        }
        if is_current {
            *self.local_checkpoint_mut()? = checkpoint;
        }
        Ok(())
    }

    /// Local checkpoint folded with the log through the shared checkpoint
    pub fn conflated(&self, starting_with: Option<u32>) -> Result<Checkpoint> {
        let local = self.local_checkpoint()?;
        let shared = self.shared_checkpoint()?;
        Ok(conflate(&self.checkpoints, local, starting_with, shared)?)
    }

    /// The whole log from the oldest ordinal through the shared checkpoint
    pub fn conflated_log(&self) -> Result<Checkpoint> {
        let shared = self.shared_checkpoint()?;
        let base = Checkpoint::new(shared.instance_id, 0, builtin_grains_mtime());
        Ok(conflate(&self.checkpoints, &base, Some(OLDEST_ORDINAL), shared)?)
    }

    // Grains

    /// Cache a grain; `update_checkpoint` records it on the active checkpoint
    pub fn store_grain(
        &mut self,
        grain: &Grain,
        update_checkpoint: bool,
        side_file: bool,
    ) -> Result<PathBuf> {
        let path = self.grains.write(grain, side_file)?;
        if update_checkpoint && !side_file {
            self.local_checkpoint_mut()?
                .record_modification(grain.id, grain.m_time);
        }
        Ok(path)
    }

    pub fn load_grain(&self, id: GrainId) -> Result<Option<Grain>> {
        Ok(self.grains.read(id)?)
    }

    pub fn contains_grain(&self, id: GrainId) -> bool {
        self.grains.exists(id)
    }

    /// Remove cached copies; returns how many existed
    pub fn delete_grains(&self, ids: &[GrainId]) -> Result<usize> {
        let mut removed = 0;
        for &id in ids {
            if self.grains.delete(id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Cached grains ordered by path, optionally prefiltered by id
    pub fn list_grains(&self, prefilter: Option<&dyn Fn(GrainId) -> bool>) -> Result<Vec<Grain>> {
        let mut grains = Vec::new();
        for id in self.grains.list_ids()? {
            if prefilter.map_or(true, |accept| accept(id)) {
                if let Some(grain) = self.grains.read(id)? {
                    grains.push(grain);
                }
            }
        }
        grains.sort_by(|a, b| a.path.cmp(&b.path).then(a.id.cmp(&b.id)));
        Ok(grains)
    }

    /// Drop a grain from the active checkpoint's pending sets
    pub fn forget_modification(&mut self, id: GrainId) -> Result<bool> {
        let forgotten_local = self.local_checkpoint_mut()?.forget(&id);
        let forgotten_shared = self
            .shared
            .as_mut()
            .map_or(false, |shared| shared.forget(&id));
        Ok(forgotten_local || forgotten_shared)
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TrackingError::io(path, e)),
    }
}
