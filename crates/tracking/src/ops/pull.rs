//! Bring broker changes into the snapshot directory

use crate::directory::SnapshotDirectory;
use crate::error::TrackingError;
use crate::resolver::{Conflict, ConflictResolver, Resolution};
use crate::validate::validate_connection;
use crate::Result;
use broker::{paged, Broker, ListQuery};
use grain::{Grain, GrainId, TrackingStatus};
use journal::Checkpoint;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct PullOptions {
    /// Never treat a cached copy as a local modification
    pub overwrite: bool,
    /// Open a new checkpoint even on a clean history
    pub force_checkpoint: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PullOutcome {
    /// Grains added or updated, in processing order
    pub stored: Vec<Grain>,
    /// Cached grains purged because the broker no longer has them
    pub purged: Vec<Grain>,
    /// Conflicting broker versions parked in side files
    pub side_files: Vec<PathBuf>,
    /// Broker grains skipped because they were deleted locally
    pub deleted_locally: Vec<GrainId>,
    /// Number of changes counted against the checkpoint
    pub changes: usize,
    /// Ordinal the changes were recorded under, if any
    pub ordinal: Option<u32>,
}

impl PullOutcome {
    pub fn is_noop(&self) -> bool {
        self.changes == 0
    }
}

/// Cached copy counts as locally modified
///
/// A copy with the broker's exact timestamp is the same version. Otherwise it
/// conflicts when newer than the broker copy or newer than the watermark of
/// the last pull.
fn modified_locally(local: &Grain, broker: &Grain, watermark: &Checkpoint) -> bool {
    local.m_time != broker.m_time && (local.m_time > broker.m_time || local.m_time > watermark.latest)
}

pub async fn pull(
    dir: &mut SnapshotDirectory,
    broker: &dyn Broker,
    resolver: &mut dyn ConflictResolver,
    options: PullOptions,
    cancel: &CancellationToken,
) -> Result<PullOutcome> {
    validate_connection(dir, broker, cancel).await?;
    let local = dir.local_checkpoint()?.clone();
    let shared = dir.shared_checkpoint()?.clone();
    let is_safe = local.same_as(&shared);

    let mut target = if is_safe && !options.force_checkpoint {
        local.clone()
    } else {
        Checkpoint::new(local.instance_id, shared.ordinal + 1, local.latest)
    };
    debug!(safe = is_safe, ordinal = target.ordinal, "Pull target checkpoint");

    let snapshot = dir.require_snapshot()?;
    let anchor_id = snapshot
        .anchor_id()
        .ok_or_else(|| TrackingError::state(dir.path(), "snapshot has no anchor"))?;
    let query = ListQuery {
        recursive: snapshot.scope.is_recursive(),
        modified_since: Some(local.latest),
        include_root: snapshot.scope.includes_anchor(),
        ..ListQuery::children(anchor_id)
    };
    let broker_grains = broker.list_grains(&query, cancel).await?;
    let conflated = dir.conflated(None)?;

    let mut outcome = PullOutcome::default();
    let mut incoming: BTreeMap<GrainId, (TrackingStatus, TrackingStatus)> = BTreeMap::new();
    let mut prefixes = BTreeSet::new();

    for grain in &broker_grains {
        if dir.is_ignored(grain) {
            continue;
        }
        match dir.load_grain(grain.id)? {
            None if conflated.deletions.contains(&grain.id) => {
                debug!(grain = %grain.id, "Skipping grain deleted locally");
                outcome.deleted_locally.push(grain.id);
            }
            None => {
                incoming.insert(grain.id, (TrackingStatus::Missing, TrackingStatus::New));
                outcome.changes += 1;
            }
            Some(cached) => {
                let local_status = if !options.overwrite && modified_locally(&cached, grain, &local) {
                    TrackingStatus::Modified
                } else {
                    TrackingStatus::Uptodate
                };
                incoming.insert(grain.id, (local_status, TrackingStatus::Modified));
                if let Some(prefix) = grain.parent_path_prefix() {
                    prefixes.insert(prefix.to_string());
                }
                outcome.changes += 1;
            }
        }
    }

    let ids: Vec<GrainId> = incoming.keys().copied().collect();
    for grain in paged::pull_grains(broker, &ids, cancel).await? {
        let Some(&(local_status, broker_status)) = incoming.get(&grain.id) else {
            continue;
        };
        if local_status == TrackingStatus::Modified && broker_status == TrackingStatus::Modified {
            resolve(dir, resolver, grain, &mut target, &mut outcome)?;
        } else {
            import(dir, grain, &mut target, &mut outcome)?;
        }
    }

    if !prefixes.is_empty() {
        let not_incoming: &dyn Fn(GrainId) -> bool = &|id| !incoming.contains_key(&id);
        let candidates: BTreeMap<GrainId, Grain> = dir
            .list_grains(Some(not_incoming))?
            .into_iter()
            .filter(|grain| prefixes.iter().any(|prefix| grain.is_under(prefix)))
            .map(|grain| (grain.id, grain))
            .collect();
        let ids: Vec<GrainId> = candidates.keys().copied().collect();
        let exists = paged::check_exist(broker, &ids, cancel).await?;
        for (id, grain) in candidates {
            if exists.get(&id).copied().unwrap_or(false) {
                continue;
            }
            info!(grain = %id, path = grain.display_path(), "Purging grain deleted on broker");
            dir.delete_grains(&[id])?;
            target.record_deletion(id);
            outcome.purged.push(grain);
            outcome.changes += 1;
        }
    }

    if outcome.changes == 0 {
        info!(path = %dir.path().display(), "Snapshot is up to date");
        return Ok(outcome);
    }

    if let Some(snapshot) = dir.snapshot_mut() {
        snapshot.updated = chrono::Utc::now();
        snapshot.checkpoint = target.ordinal;
    }
    let instance_id = dir.broker_instance_id();
    if let Some(state) = dir.local_state_mut() {
        if is_safe && state.last_push_checkpoint == shared.ordinal {
            state.last_push_checkpoint = target.ordinal;
        }
    }
    if is_safe {
        if let Some(instance_id) = instance_id {
            target.instance_id = instance_id;
        }
    }
    outcome.ordinal = Some(target.ordinal);
    info!(changes = outcome.changes, ordinal = target.ordinal, "Pulled changes");
    dir.store_checkpoint(target, true)?;
    dir.store_metadata(false)?;
    Ok(outcome)
}

fn import(
    dir: &mut SnapshotDirectory,
    grain: Grain,
    target: &mut Checkpoint,
    outcome: &mut PullOutcome,
) -> Result<()> {
    debug!(grain = %grain.id, path = grain.display_path(), "Storing grain");
    dir.store_grain(&grain, false, false)?;
    target.record_modification(grain.id, grain.m_time);
    outcome.stored.push(grain);
    Ok(())
}

fn resolve(
    dir: &mut SnapshotDirectory,
    resolver: &mut dyn ConflictResolver,
    broker_grain: Grain,
    target: &mut Checkpoint,
    outcome: &mut PullOutcome,
) -> Result<()> {
    let local = dir
        .load_grain(broker_grain.id)?
        .ok_or(TrackingError::GrainLoad(broker_grain.id))?;
    warn!(
        grain = %broker_grain.id,
        path = broker_grain.display_path(),
        local = %local.m_time,
        broker = %broker_grain.m_time,
        "Grain modified on both sides"
    );
    let conflict = Conflict {
        local,
        broker: broker_grain,
    };

    loop {
        match resolver.resolve(&conflict) {
            Resolution::KeepLocal => {
                let mut kept = conflict.local;
                kept.m_time = conflict.broker.m_time;
                return import(dir, kept, target, outcome);
            }
            Resolution::AcceptBroker => return import(dir, conflict.broker, target, outcome),
            Resolution::SaveSideFile => {
                let path = dir.store_grain(&conflict.broker, false, true)?;
                info!(grain = %conflict.broker.id, path = %path.display(), "Saved broker version");
                outcome.side_files.push(path);
                return Ok(());
            }
            Resolution::ShowDiff => resolver.show_diff(&conflict),
        }
    }
}
