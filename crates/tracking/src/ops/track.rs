//! Start tracking a broker subtree in a new snapshot directory

use crate::directory::{SnapshotDirectory, VcsFlavor};
use crate::error::TrackingError;
use crate::grains::GrainFiles;
use crate::snapshot::Snapshot;
use crate::validate::validate_broker;
use crate::Result;
use broker::{paged, Broker, BrokerError, ConnectionSettings, ListQuery};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use grain::{builtin_grains_mtime, Grain, GrainId, IgnoreFilter, Scope};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Blocking workers writing grain files during the initial pull
const WRITE_WORKERS: usize = 4;

/// Anchor given by id or by broker path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorRef {
    Id(GrainId),
    Path(String),
}

impl fmt::Display for AnchorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorRef::Id(id) => write!(f, "{id}"),
            AnchorRef::Path(path) => f.write_str(path),
        }
    }
}

impl FromStr for AnchorRef {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(id) = Uuid::parse_str(s) {
            return Ok(AnchorRef::Id(id));
        }
        if s.starts_with('/') {
            return Ok(AnchorRef::Path(s.to_string()));
        }
        Err(format!("'{s}' is neither a grain id nor an absolute path"))
    }
}

#[derive(Debug, Clone)]
pub struct TrackOptions {
    pub anchor: AnchorRef,
    pub scope: Scope,
    pub vcs: VcsFlavor,
    pub ignores: IgnoreFilter,
}

#[derive(Debug, Clone)]
pub struct TrackOutcome {
    pub anchor: Grain,
    pub instance_id: Uuid,
    /// Grains written to the cache, anchor included
    pub stored: usize,
    /// Grains left out by the ignore filter
    pub ignored: Vec<GrainId>,
}

pub async fn track(
    dir: &mut SnapshotDirectory,
    broker: &dyn Broker,
    connection: ConnectionSettings,
    options: TrackOptions,
    cancel: &CancellationToken,
) -> Result<TrackOutcome> {
    if dir.has_snapshot() {
        return Err(TrackingError::state(dir.path(), "a snapshot already exists"));
    }
    let info = validate_broker(broker, None, None, cancel).await?;

    let anchor = match &options.anchor {
        AnchorRef::Id(id) => broker.get_grain(*id, cancel).await?,
        AnchorRef::Path(path) => broker.get_grain_by_path(path, cancel).await?,
    }
    .ok_or_else(|| TrackingError::AnchorGrain {
        id: options.anchor.to_string(),
        reason: format!("not found on {}", broker.url()),
    })?;

    let mut snapshot = Snapshot::new(options.scope, Some(info.schema_version));
    snapshot.anchor = broker
        .grain_path(anchor.id, cancel)
        .await?
        .into_iter()
        .map(|grain| grain.id)
        .collect();
    if snapshot.anchor.last() != Some(&anchor.id) {
        snapshot.anchor.push(anchor.id);
    }

    if let Err(e) = dir.initialize(info.instance_id, snapshot, options.vcs, Some(connection)) {
        discard(dir);
        return Err(TrackingError::SnapshotInit {
            path: dir.path().to_path_buf(),
            reason: e.to_string(),
        });
    }
    info!(
        path = %dir.path().display(),
        anchor = %anchor.id,
        scope = %options.scope,
        "Tracking grains"
    );

    match populate(dir, broker, &anchor, options.ignores, cancel).await {
        Ok((stored, ignored)) => Ok(TrackOutcome {
            anchor,
            instance_id: info.instance_id,
            stored,
            ignored,
        }),
        Err(e) => {
            discard(dir);
            Err(e)
        }
    }
}

fn discard(dir: &mut SnapshotDirectory) {
    if let Err(e) = dir.clean_up() {
        warn!(error = %e, "Failed to clean up snapshot directory");
    }
}

async fn populate(
    dir: &mut SnapshotDirectory,
    broker: &dyn Broker,
    anchor: &Grain,
    ignores: IgnoreFilter,
    cancel: &CancellationToken,
) -> Result<(usize, Vec<GrainId>)> {
    dir.set_ignores(ignores);
    dir.store_ignores()?;
    let scope = dir.require_snapshot()?.scope;

    let mut wanted = Vec::new();
    let mut ignored = Vec::new();
    let mut latest = builtin_grains_mtime();

    let anchor_included = scope.includes_anchor() && !dir.is_ignored(anchor);
    if anchor_included {
        wanted.push(anchor.id);
        latest = latest.max(anchor.m_time);
    } else if scope.includes_anchor() {
        warn!(anchor = %anchor.id, "Anchor grain is ignored");
        ignored.push(anchor.id);
    }

    if scope.contains(Scope::CHILDREN) || scope.contains(Scope::DESCENDANTS) {
        let query = ListQuery {
            recursive: scope.is_recursive(),
            ..ListQuery::children(anchor.id)
        };
        let mut excluded = HashSet::new();
        for grain in broker.list_grains(&query, cancel).await? {
            let parent_excluded = grain
                .parent_id
                .map_or(false, |parent| excluded.contains(&parent));
            if parent_excluded || dir.is_ignored(&grain) {
                debug!(grain = %grain.id, path = grain.display_path(), "Ignoring grain");
                excluded.insert(grain.id);
                ignored.push(grain.id);
                continue;
            }
            latest = latest.max(grain.m_time);
            wanted.push(grain.id);
        }
    }

    let pulled = paged::pull_grains(broker, &wanted, cancel).await?;
    if anchor_included && !pulled.iter().any(|grain| grain.id == anchor.id) {
        return Err(TrackingError::AnchorGrain {
            id: anchor.id.to_string(),
            reason: "the broker did not export it".to_string(),
        });
    }

    let written = write_grains(dir.grain_files().clone(), pulled, cancel).await?;
    let stored = written.len();
    let checkpoint = dir.local_checkpoint_mut()?;
    for (id, m_time) in written {
        checkpoint.record_modification(id, m_time);
    }
    checkpoint.latest = latest;

    if let Some(snapshot) = dir.snapshot_mut() {
        snapshot.updated = Utc::now();
    }
    dir.store_metadata(true)?;
    info!(stored, ignored = ignored.len(), "Initial pull complete");
    Ok((stored, ignored))
}

/// Write grain files through a bounded pool of blocking workers
async fn write_grains(
    files: GrainFiles,
    grains: Vec<Grain>,
    cancel: &CancellationToken,
) -> Result<Vec<(GrainId, DateTime<Utc>)>> {
    let writes = grains.into_iter().map(|grain| {
        let files = files.clone();
        tokio::task::spawn_blocking(move || {
            files
                .write(&grain, false)
                .map(|_| (grain.id, grain.m_time))
        })
    });
    let results: Vec<_> = stream::iter(writes)
        .buffer_unordered(WRITE_WORKERS)
        .take_until(cancel.cancelled())
        .collect()
        .await;
    if cancel.is_cancelled() {
        return Err(BrokerError::Cancelled.into());
    }

    let mut written = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(entry) => written.push(entry?),
            Err(e) => {
                return Err(TrackingError::state(
                    files.dir(),
                    format!("grain writer failed: {e}"),
                ))
            }
        }
    }
    Ok(written)
}
