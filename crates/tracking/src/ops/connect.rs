//! Attach a snapshot to a broker, and drop cached credentials

use crate::directory::{Adopt, SnapshotDirectory};
use crate::error::TrackingError;
use crate::validate::{validate_broker, validate_snapshot};
use crate::Result;
use broker::{paged, Authenticator, Broker, ConnectionSettings, ServerInfo};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Connect a checked-out snapshot to a broker holding the same subtree
///
/// Every ancestor of the anchor must exist on the broker; the anchor itself
/// may still be missing and is brought over by the next push.
pub async fn connect(
    dir: &mut SnapshotDirectory,
    broker: &dyn Broker,
    connection: ConnectionSettings,
    adopt: Adopt,
    cancel: &CancellationToken,
) -> Result<ServerInfo> {
    validate_snapshot(dir, false)?;
    if dir.is_connected() {
        return Err(TrackingError::state(dir.path(), "already connected"));
    }
    let snapshot = dir.require_snapshot()?.clone();
    let info = validate_broker(
        broker,
        snapshot.schema_version,
        dir.broker_instance_id(),
        cancel,
    )
    .await?;

    let anchor_id = snapshot.anchor_id();
    let exists = paged::check_exist(broker, &snapshot.anchor, cancel).await?;
    let missing: Vec<String> = snapshot
        .anchor
        .iter()
        .filter(|&&id| Some(id) != anchor_id && !exists.get(&id).copied().unwrap_or(false))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(TrackingError::AnchorGrain {
            id: missing.join(", "),
            reason: format!("ancestors of the anchor are missing on {}", broker.url()),
        });
    }

    if let Err(e) = dir.connect(connection, info.instance_id, adopt, None) {
        if let Err(cleanup) = dir.disconnect() {
            warn!(error = %cleanup, "Failed to remove local state");
        }
        return Err(TrackingError::SnapshotInit {
            path: dir.path().to_path_buf(),
            reason: e.to_string(),
        });
    }
    info!(
        path = %dir.path().display(),
        url = broker.url(),
        instance = %info.instance_id,
        ?adopt,
        "Connected snapshot"
    );
    Ok(info)
}

/// Forget credentials cached in the connection settings
pub fn logout(dir: &mut SnapshotDirectory, authenticator: &Authenticator) -> Result<()> {
    validate_snapshot(dir, true)?;
    let path = dir.path().to_path_buf();
    let connection = dir
        .connection_mut()
        .ok_or_else(|| TrackingError::state(&path, "not connected to a broker"))?;
    if !authenticator.invalidate(connection) {
        return Err(TrackingError::AuthProvider(format!(
            "{} credentials could not be invalidated",
            authenticator.scheme()
        )));
    }
    dir.store_local_state(false)?;
    info!(path = %path.display(), "Logged out");
    Ok(())
}
