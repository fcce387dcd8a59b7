//! Send locally recorded changes to the broker

use crate::directory::{Adopt, SnapshotDirectory};
use crate::error::TrackingError;
use crate::validate::validate_connection;
use crate::Result;
use broker::{Broker, DuplicatesStrategy, ImportResults, Severity};
use grain::{Grain, GrainId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct PushOptions {
    /// Resend everything after this ordinal
    pub starting_checkpoint: Option<u32>,
    pub strategy: DuplicatesStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    /// Every shared checkpoint was pushed already
    UpToDate,
    /// The pending range held no changes; the broker was not contacted
    NothingToPush,
    Pushed,
}

#[derive(Debug, Clone)]
pub struct PushOutcome {
    pub status: PushStatus,
    /// Ordinal through which changes have now been pushed
    pub ordinal: u32,
    pub stored: Vec<Grain>,
    pub deleted: Vec<GrainId>,
    /// Recorded as modified but missing from the cache
    pub stale: Vec<GrainId>,
    pub results: Option<ImportResults>,
}

impl PushOutcome {
    fn up_to_date(ordinal: u32) -> Self {
        Self {
            status: PushStatus::UpToDate,
            ordinal,
            stored: Vec::new(),
            deleted: Vec::new(),
            stale: Vec::new(),
            results: None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.status != PushStatus::Pushed
    }

    pub fn has_warnings(&self) -> bool {
        self.results.as_ref().map_or(false, ImportResults::has_warnings)
    }
}

pub async fn push(
    dir: &mut SnapshotDirectory,
    broker: &dyn Broker,
    options: PushOptions,
    cancel: &CancellationToken,
) -> Result<PushOutcome> {
    validate_connection(dir, broker, cancel).await?;
    let local = dir.local_checkpoint()?.clone();
    let shared = dir.shared_checkpoint()?.clone();
    let is_safe = local.same_as(&shared);

    let path = dir.path().to_path_buf();
    let state = dir
        .local_state_mut()
        .ok_or_else(|| TrackingError::state(&path, "not connected to a broker"))?;
    if let Some(start) = options.starting_checkpoint {
        state.last_push_checkpoint = start;
    } else if state.last_push_has_errors {
        // The previous batch is resent as a whole
        state.last_push_checkpoint = state.last_push_checkpoint.saturating_sub(1);
    }
    let last_push = state.last_push_checkpoint;

    if is_safe && last_push == shared.ordinal {
        info!(ordinal = last_push, "Broker is up to date");
        return Ok(PushOutcome::up_to_date(last_push));
    }

    let conflated = dir.conflated(Some((last_push + 1).min(shared.ordinal)))?;
    debug!(
        from = last_push + 1,
        through = conflated.ordinal,
        modifications = conflated.modifications.len(),
        deletions = conflated.deletions.len(),
        "Conflated pending changes"
    );

    let mut stored = Vec::new();
    let mut stale = Vec::new();
    for &id in &conflated.modifications {
        match dir.load_grain(id)? {
            Some(grain) => stored.push(grain),
            None => {
                warn!(grain = %id, ordinal = shared.ordinal, "Recorded grain is missing locally");
                stale.push(id);
            }
        }
    }
    for &id in &stale {
        dir.forget_modification(id)?;
    }
    let deleted: Vec<GrainId> = conflated.deletions.iter().copied().collect();

    let results = if stored.is_empty() && deleted.is_empty() {
        info!(ordinal = conflated.ordinal, "Nothing to push");
        None
    } else {
        let results = broker
            .push_grains(&stored, &conflated.deletions, options.strategy, cancel)
            .await
            .map_err(|e| match e {
                e if e.is_cancelled() => TrackingError::Broker(e),
                e => TrackingError::BrokerPush {
                    url: broker.url().to_string(),
                    reason: e.to_string(),
                },
            })?;
        log_feedback(&results);
        info!(
            imported = results.imported_count,
            deleted = results.deleted_count,
            url = broker.url(),
            "Pushed grains"
        );
        Some(results)
    };
    let has_errors = results.as_ref().map_or(false, ImportResults::has_errors);

    if let Some(state) = dir.local_state_mut() {
        state.last_push_checkpoint = conflated.ordinal;
        state.last_push_has_errors = has_errors;
    }
    if !is_safe && local.ordinal == 0 {
        dir.adopt_checkpoint(Adopt::Shared)?;
    }
    dir.store_metadata(false)?;

    Ok(PushOutcome {
        status: if results.is_some() {
            PushStatus::Pushed
        } else {
            PushStatus::NothingToPush
        },
        ordinal: conflated.ordinal,
        stored,
        deleted,
        stale,
        results,
    })
}

fn log_feedback(results: &ImportResults) {
    for feedback in &results.feedback {
        let object = feedback
            .object_id
            .map_or_else(|| "unspecified".to_string(), |id| id.to_string());
        match feedback.feedback_type {
            Severity::Error | Severity::Critical => {
                error!(object = %object, code = ?feedback.code, "{}", feedback.message)
            }
            Severity::Warning => {
                warn!(object = %object, code = ?feedback.code, "{}", feedback.message)
            }
            _ => debug!(object = %object, code = ?feedback.code, "{}", feedback.message),
        }
    }
}
