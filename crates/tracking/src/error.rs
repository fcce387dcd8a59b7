use broker::{BrokerError, Version};
use grain::GrainId;
use journal::JournalError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Closed set of command result codes, also used as process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
    Success = 0,
    ParameterError = -2,
    SnapshotStateError = -1,
    SnapshotVersionError = 1,
    BrokerConnectionError = 2,
    SchemaVersionError = 3,
    ApiVersionError = 4,
    InstanceIdError = 5,
    AnchorGrainError = 6,
    SnapshotInitError = 7,
    AuthProviderError = 8,
    GrainLoadError = 9,
    BrokerPushError = 10,
    StatusOutOfDate = 42,
}

impl ResultCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.as_i32())
    }
}

/// Failures of snapshot-level operations
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("invalid parameter: {0}")]
    Parameter(String),

    #[error("snapshot at {}: {reason}", path.display())]
    SnapshotState { path: PathBuf, reason: String },

    #[error("snapshot version {found} is not supported (expected {expected})")]
    SnapshotVersion { found: Version, expected: Version },

    #[error("broker {url} is not usable: {reason}")]
    BrokerConnection { url: String, reason: String },

    #[error("broker schema version {broker} does not match snapshot schema {snapshot}")]
    SchemaVersion { broker: Version, snapshot: Version },

    #[error("broker API version {found} is older than required {required}")]
    ApiVersion { found: Version, required: Version },

    #[error("broker instance {found} differs from connected instance {expected}")]
    InstanceId { found: Uuid, expected: Uuid },

    #[error("anchor grain {id}: {reason}")]
    AnchorGrain { id: String, reason: String },

    #[error("failed to initialize snapshot at {}: {reason}", path.display())]
    SnapshotInit { path: PathBuf, reason: String },

    #[error("authentication provider failed: {0}")]
    AuthProvider(String),

    #[error("local copy of grain {0} is missing")]
    GrainLoad(GrainId),

    #[error("push to {url} failed: {reason}")]
    BrokerPush { url: String, reason: String },

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TrackingError {
    pub(crate) fn state(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TrackingError::SnapshotState {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrackingError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> ResultCode {
        match self {
            TrackingError::Parameter(_) => ResultCode::ParameterError,
            TrackingError::SnapshotState { .. }
            | TrackingError::Journal(_)
            | TrackingError::Io { .. } => ResultCode::SnapshotStateError,
            TrackingError::SnapshotVersion { .. } => ResultCode::SnapshotVersionError,
            TrackingError::Broker(broker::BrokerError::Auth(_)) => ResultCode::AuthProviderError,
            TrackingError::BrokerConnection { .. } | TrackingError::Broker(_) => {
                ResultCode::BrokerConnectionError
            }
            TrackingError::SchemaVersion { .. } => ResultCode::SchemaVersionError,
            TrackingError::ApiVersion { .. } => ResultCode::ApiVersionError,
            TrackingError::InstanceId { .. } => ResultCode::InstanceIdError,
            TrackingError::AnchorGrain { .. } => ResultCode::AnchorGrainError,
            TrackingError::SnapshotInit { .. } => ResultCode::SnapshotInitError,
            TrackingError::AuthProvider(_) => ResultCode::AuthProviderError,
            TrackingError::GrainLoad(_) => ResultCode::GrainLoadError,
            TrackingError::BrokerPush { .. } => ResultCode::BrokerPushError,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TrackingError::Broker(e) if e.is_cancelled())
    }
}
