//! Snapshot, connection and synchronization summary

use crate::directory::SnapshotDirectory;
use crate::error::TrackingError;
use crate::snapshot::Snapshot;
use crate::validate::{validate_broker, validate_snapshot};
use crate::Result;
use broker::{AuthScheme, Broker, ServerInfo};
use grain::Grain;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub broker_url: String,
    pub auth: AuthScheme,
    pub instance_id: Uuid,
    pub has_credentials: bool,
}

#[derive(Debug, Clone)]
pub struct SyncInfo {
    pub local_ordinal: u32,
    pub shared_ordinal: u32,
    pub last_push: u32,
    pub last_push_has_errors: bool,
    pub in_sync: bool,
}

#[derive(Debug)]
pub struct InfoReport {
    pub path: PathBuf,
    pub snapshot: Snapshot,
    /// Cached copy of the anchor grain
    pub anchor: Option<Grain>,
    pub checkpoints: usize,
    pub ignores: usize,
    pub connection: Option<ConnectionInfo>,
    pub sync: Option<SyncInfo>,
    /// Result of a live broker check, when one was requested
    pub validation: Option<std::result::Result<ServerInfo, TrackingError>>,
}

/// Gather the summary; with a broker, also check it is still usable
pub async fn info(
    dir: &SnapshotDirectory,
    broker: Option<&dyn Broker>,
    cancel: &CancellationToken,
) -> Result<InfoReport> {
    validate_snapshot(dir, false)?;
    let snapshot = dir.require_snapshot()?.clone();
    let anchor = match snapshot.anchor_id() {
        Some(id) => dir.load_grain(id)?,
        None => None,
    };

    let connection = dir.local_state().and_then(|state| {
        state.connection.as_ref().map(|connection| ConnectionInfo {
            broker_url: connection.broker_url.clone(),
            auth: connection.auth,
            instance_id: state.instance_id,
            has_credentials: !connection.auth_params.is_empty(),
        })
    });
    let sync = match dir.local_state() {
        Some(state) => {
            let shared = dir.shared_checkpoint()?;
            Some(SyncInfo {
                local_ordinal: state.active_checkpoint.ordinal,
                shared_ordinal: shared.ordinal,
                last_push: state.last_push_checkpoint,
                last_push_has_errors: state.last_push_has_errors,
                in_sync: state.active_checkpoint.same_as(shared),
            })
        }
        None => None,
    };

    let validation = match broker {
        Some(broker) => Some(
            validate_broker(
                broker,
                snapshot.schema_version,
                dir.broker_instance_id(),
                cancel,
            )
            .await,
        ),
        None => None,
    };

    Ok(InfoReport {
        path: dir.path().to_path_buf(),
        checkpoints: dir.checkpoints().list_ordinals()?.len(),
        ignores: dir
            .ignores()
            .map_or(0, |filter| filter.ids.len() + filter.types.len()),
        snapshot,
        anchor,
        connection,
        sync,
        validation,
    })
}
