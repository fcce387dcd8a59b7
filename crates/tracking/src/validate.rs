//! Preconditions shared by every snapshot operation

use crate::directory::SnapshotDirectory;
use crate::error::TrackingError;
use crate::Result;
use broker::{Broker, ServerInfo, Version, MINIMUM_API_VERSION};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Check that the broker speaks a supported API, matches the snapshot's
/// schema and, once connected, is still the same instance
pub async fn validate_broker(
    broker: &dyn Broker,
    schema_version: Option<Version>,
    instance_id: Option<Uuid>,
    cancel: &CancellationToken,
) -> Result<ServerInfo> {
    let info = broker
        .server_info(cancel)
        .await
        .map_err(|e| match e {
            e if e.is_cancelled() => TrackingError::Broker(e),
            e => TrackingError::BrokerConnection {
                url: broker.url().to_string(),
                reason: e.to_string(),
            },
        })?;
    debug!(
        url = broker.url(),
        version = %info.version,
        schema = %info.schema_version,
        instance = %info.instance_id,
        "Broker identified"
    );

    if info.version < MINIMUM_API_VERSION {
        return Err(TrackingError::ApiVersion {
            found: info.version,
            required: MINIMUM_API_VERSION,
        });
    }
    if let Some(snapshot) = schema_version {
        if snapshot != info.schema_version {
            return Err(TrackingError::SchemaVersion {
                broker: info.schema_version,
                snapshot,
            });
        }
    }
    if let Some(expected) = instance_id {
        if expected != info.instance_id {
            return Err(TrackingError::InstanceId {
                found: info.instance_id,
                expected,
            });
        }
    }
    Ok(info)
}

/// Check a connected snapshot against the broker it is about to talk to
///
/// The broker must still be the instance the snapshot is connected to and
/// carry the snapshot's schema.
pub async fn validate_connection(
    dir: &SnapshotDirectory,
    broker: &dyn Broker,
    cancel: &CancellationToken,
) -> Result<ServerInfo> {
    validate_snapshot(dir, true)?;
    let schema_version = dir.require_snapshot()?.schema_version;
    validate_broker(broker, schema_version, dir.broker_instance_id(), cancel).await
}

/// Check that the directory holds a usable snapshot
pub fn validate_snapshot(
    dir: &SnapshotDirectory,
    must_be_connected: bool,
) -> Result<()> {
    if !dir.is_directory() {
        return Err(TrackingError::state(dir.path(), "not a directory"));
    }
    if !dir.is_ready() {
        return Err(TrackingError::state(dir.path(), "snapshot files are inconsistent"));
    }
    let snapshot = dir.require_snapshot()?;
    if snapshot.anchor.is_empty() {
        return Err(TrackingError::state(dir.path(), "snapshot has no anchor"));
    }
    if must_be_connected && dir.connection().is_none() {
        return Err(TrackingError::state(dir.path(), "not connected to a broker"));
    }
    Ok(())
}
