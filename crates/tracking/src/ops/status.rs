//! Compare the snapshot directory with the broker without changing either

use crate::directory::SnapshotDirectory;
use crate::error::ResultCode;
use crate::validate::validate_connection;
use crate::Result;
use broker::{paged, Broker, ListQuery};
use grain::{builtin_grains_mtime, Grain, GrainId, TrackingStatus};
use std::collections::{BTreeMap, HashMap};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusOptions {
    /// Treat everything newer than the built-in content as locally changed
    pub assume_reset: bool,
}

/// Classification of one grain on both sides
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEntry {
    pub id: GrainId,
    pub path: Option<String>,
    pub local: TrackingStatus,
    pub broker: TrackingStatus,
}

impl StatusEntry {
    fn new(grain: &Grain, local: TrackingStatus, broker: TrackingStatus) -> Self {
        Self {
            id: grain.id,
            path: grain.path.clone(),
            local,
            broker,
        }
    }

    pub fn is_uptodate(&self) -> bool {
        self.local.is_uptodate() && self.broker.is_uptodate()
    }

    /// Counts against a clean status; ignored grains never do
    pub fn is_outdated(&self) -> bool {
        !self.is_uptodate()
            && self.local != TrackingStatus::Ignored
            && self.broker != TrackingStatus::Ignored
    }

    /// Changed on both sides
    pub fn is_conflict(&self) -> bool {
        !self.local.is_uptodate() && !self.broker.is_uptodate()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    /// Every grain considered, clean ones included
    pub entries: Vec<StatusEntry>,
    /// Local checkpoint is the shared one
    pub in_sync: bool,
    pub local_ordinal: u32,
    pub shared_ordinal: u32,
}

impl StatusReport {
    pub fn is_outdated(&self) -> bool {
        self.entries.iter().any(StatusEntry::is_outdated)
    }

    pub fn changed(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries.iter().filter(|entry| !entry.is_uptodate())
    }

    pub fn result_code(&self) -> ResultCode {
        if self.is_outdated() {
            ResultCode::StatusOutOfDate
        } else {
            ResultCode::Success
        }
    }
}

pub async fn status(
    dir: &SnapshotDirectory,
    broker: &dyn Broker,
    options: StatusOptions,
    cancel: &CancellationToken,
) -> Result<StatusReport> {
    validate_connection(dir, broker, cancel).await?;
    let local = dir.local_checkpoint()?;
    let shared = dir.shared_checkpoint()?;
    let in_sync = local.same_as(shared);
    if !in_sync {
        warn!(
            local = local.ordinal,
            shared = shared.ordinal,
            "Local checkpoint differs from the shared one"
        );
    }

    let snapshot = dir.require_snapshot()?;
    let Some(anchor_id) = snapshot.anchor_id() else {
        return Ok(StatusReport::default());
    };
    let query = ListQuery {
        recursive: snapshot.scope.is_recursive(),
        modified_since: Some(local.latest),
        include_root: snapshot.scope.includes_anchor(),
        ..ListQuery::children(anchor_id)
    };
    let mut broker_mods: HashMap<GrainId, Grain> = broker
        .list_grains(&query, cancel)
        .await?
        .into_iter()
        .map(|grain| (grain.id, grain))
        .collect();

    let mut log = dir.conflated_log()?;
    let baseline = if options.assume_reset {
        builtin_grains_mtime()
    } else {
        local.latest
    };

    let mut entries = Vec::new();
    let mut additions: BTreeMap<GrainId, Grain> = BTreeMap::new();
    let mut deletions: BTreeMap<GrainId, Grain> = BTreeMap::new();

    for grain in dir.list_grains(None)? {
        let mut local_status = TrackingStatus::Uptodate;
        let mut broker_status = TrackingStatus::Uptodate;
        if let Some(on_broker) = broker_mods.remove(&grain.id) {
            broker_status = TrackingStatus::Modified;
            if on_broker.m_time < grain.m_time {
                local_status = TrackingStatus::Modified;
            }
        }

        let mut pending = false;
        if !log.modifications.contains(&grain.id) {
            local_status = if shared.modifications.contains(&grain.id) {
                TrackingStatus::New
            } else {
                TrackingStatus::Obscure
            };
        } else if log.deletions.contains(&grain.id) {
            local_status = TrackingStatus::Obscure;
        } else if local_status.is_uptodate()
            && broker_status.is_uptodate()
            && grain.m_time > baseline
        {
            local_status = TrackingStatus::Modified;
            if options.assume_reset || (!in_sync && !local.modifications.contains(&grain.id)) {
                pending = true;
            }
        }

        log.forget(&grain.id);
        if pending {
            additions.insert(grain.id, grain);
        } else if local_status.is_uptodate() && broker_status.is_uptodate() {
            entries.push(StatusEntry::new(&grain, local_status, broker_status));
            deletions.insert(grain.id, grain);
        } else {
            entries.push(StatusEntry::new(&grain, local_status, broker_status));
        }
    }

    // Locally changed grains the broker may not know yet
    let ids: Vec<GrainId> = additions.keys().copied().collect();
    let exists = paged::check_exist(broker, &ids, cancel).await?;
    for (id, grain) in &additions {
        let local_status = if exists.get(id).copied().unwrap_or(false) {
            TrackingStatus::Modified
        } else {
            TrackingStatus::New
        };
        entries.push(StatusEntry::new(grain, local_status, TrackingStatus::Uptodate));
    }

    // Clean grains the broker may have dropped
    let ids: Vec<GrainId> = deletions.keys().copied().collect();
    let exists = paged::check_exist(broker, &ids, cancel).await?;
    for entry in entries.iter_mut() {
        if deletions.contains_key(&entry.id) && !exists.get(&entry.id).copied().unwrap_or(true) {
            entry.broker = TrackingStatus::Deleted;
        }
    }

    // Recorded in the log but absent from the cache
    let ids: Vec<GrainId> = log.modifications.iter().copied().collect();
    let exists = paged::check_exist(broker, &ids, cancel).await?;
    for id in ids {
        let grain = Grain::deleted_placeholder(id);
        if exists.get(&id).copied().unwrap_or(false) {
            entries.push(StatusEntry {
                path: None,
                ..StatusEntry::new(&grain, TrackingStatus::Missing, TrackingStatus::Uptodate)
            });
        } else {
            entries.push(StatusEntry::new(&grain, TrackingStatus::Uptodate, TrackingStatus::Deleted));
        }
    }

    // Deleted locally but still on the broker
    let ids: Vec<GrainId> = log.deletions.iter().copied().collect();
    let exists = paged::check_exist(broker, &ids, cancel).await?;
    for id in ids {
        if exists.get(&id).copied().unwrap_or(false) {
            entries.push(StatusEntry {
                id,
                path: None,
                local: TrackingStatus::Deleted,
                broker: TrackingStatus::Uptodate,
            });
        }
    }

    // New on the broker
    let mut remaining: Vec<Grain> = broker_mods.into_values().collect();
    remaining.sort_by(|a, b| a.path.cmp(&b.path));
    for grain in remaining {
        let broker_status = if dir.is_ignored(&grain) {
            TrackingStatus::Ignored
        } else {
            TrackingStatus::New
        };
        entries.push(StatusEntry::new(&grain, TrackingStatus::Uptodate, broker_status));
    }

    let report = StatusReport {
        entries,
        in_sync,
        local_ordinal: local.ordinal,
        shared_ordinal: shared.ordinal,
    };
    debug!(
        entries = report.entries.len(),
        outdated = report.is_outdated(),
        "Status computed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(local: TrackingStatus, broker: TrackingStatus) -> StatusEntry {
        StatusEntry {
            id: Uuid::new_v4(),
            path: None,
            local,
            broker,
        }
    }

    #[test]
    fn test_ignored_entries_stay_clean() {
        let mut report = StatusReport::default();
        report
            .entries
            .push(entry(TrackingStatus::Uptodate, TrackingStatus::Uptodate));
        report
            .entries
            .push(entry(TrackingStatus::Uptodate, TrackingStatus::Ignored));
        assert!(!report.is_outdated());
        assert_eq!(report.result_code(), ResultCode::Success);
        assert_eq!(report.changed().count(), 1);

        report
            .entries
            .push(entry(TrackingStatus::Modified, TrackingStatus::Modified));
        assert!(report.is_outdated());
        assert!(report.entries[2].is_conflict());
        assert_eq!(report.result_code().as_i32(), 42);
    }
}
