//! Load two grain versions for a line diff

use crate::directory::SnapshotDirectory;
use crate::error::TrackingError;
use crate::Result;
use broker::Broker;
use grain::{Grain, GrainId};
use journal::JsonFormat;
use std::fmt;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

/// Which versions are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffMode {
    /// Cached vs broker for one id, cached vs cached for two
    #[default]
    Auto,
    Snapshot,
    Broker,
    SnapshotToBroker,
    BrokerToSnapshot,
}

impl DiffMode {
    fn sides(self, pair: bool) -> (DiffSide, DiffSide) {
        match self {
            DiffMode::Auto if pair => (DiffSide::Snapshot, DiffSide::Snapshot),
            DiffMode::Auto | DiffMode::SnapshotToBroker => (DiffSide::Snapshot, DiffSide::Broker),
            DiffMode::Snapshot => (DiffSide::Snapshot, DiffSide::Snapshot),
            DiffMode::Broker => (DiffSide::Broker, DiffSide::Broker),
            DiffMode::BrokerToSnapshot => (DiffSide::Broker, DiffSide::Snapshot),
        }
    }

    /// Whether either side is read from the broker
    pub fn needs_broker(self, pair: bool) -> bool {
        let (left, right) = self.sides(pair);
        left == DiffSide::Broker || right == DiffSide::Broker
    }
}

impl FromStr for DiffMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "auto" => Ok(DiffMode::Auto),
            "snapshot" => Ok(DiffMode::Snapshot),
            "broker" => Ok(DiffMode::Broker),
            "snapshot2broker" | "snapshottobroker" => Ok(DiffMode::SnapshotToBroker),
            "broker2snapshot" | "brokertosnapshot" => Ok(DiffMode::BrokerToSnapshot),
            _ => Err(format!("unknown diff mode '{s}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSide {
    Snapshot,
    Broker,
}

impl fmt::Display for DiffSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiffSide::Snapshot => "snapshot",
            DiffSide::Broker => "broker",
        })
    }
}

/// One side of a comparison; `text` is `None` when the grain is absent
#[derive(Debug, Clone)]
pub struct DiffSource {
    pub side: DiffSide,
    pub id: GrainId,
    pub text: Option<String>,
}

impl DiffSource {
    pub fn label(&self) -> String {
        format!("{}:{}", self.side, self.id)
    }
}

#[derive(Debug, Clone)]
pub struct GrainDiff {
    pub left: DiffSource,
    pub right: DiffSource,
}

impl GrainDiff {
    pub fn is_identical(&self) -> bool {
        self.left.text == self.right.text
    }
}

/// Render a grain the way it is stored on disk
pub fn render(grain: &Grain, format: JsonFormat) -> Result<String> {
    format
        .to_string(grain)
        .map_err(|e| TrackingError::Parameter(format!("grain {} cannot be rendered: {e}", grain.id)))
}

pub async fn load_diff(
    dir: &SnapshotDirectory,
    broker: Option<&dyn Broker>,
    first: GrainId,
    second: Option<GrainId>,
    mode: DiffMode,
    cancel: &CancellationToken,
) -> Result<GrainDiff> {
    let (left_side, right_side) = mode.sides(second.is_some());
    if left_side == right_side && second.is_none() {
        return Err(TrackingError::Parameter(format!(
            "comparing {left_side} against itself needs two grain ids"
        )));
    }
    let second = second.unwrap_or(first);

    let left = load_side(dir, broker, left_side, first, cancel).await?;
    let right = load_side(dir, broker, right_side, second, cancel).await?;
    if left.text.is_none() && right.text.is_none() {
        return Err(TrackingError::GrainLoad(first));
    }
    Ok(GrainDiff { left, right })
}

async fn load_side(
    dir: &SnapshotDirectory,
    broker: Option<&dyn Broker>,
    side: DiffSide,
    id: GrainId,
    cancel: &CancellationToken,
) -> Result<DiffSource> {
    let grain = match side {
        DiffSide::Snapshot => dir.load_grain(id)?,
        DiffSide::Broker => {
            let broker = broker.ok_or_else(|| {
                TrackingError::Parameter("comparing with the broker needs a connection".to_string())
            })?;
            broker.get_grain(id, cancel).await?
        }
    };
    let text = grain
        .map(|grain| render(&grain, dir.format()))
        .transpose()?;
    Ok(DiffSource { side, id, text })
}
