//! Id-set calls issued in fixed-size pages, one page at a time

use crate::client::Broker;
use crate::error::BrokerError;
use crate::Result;
use grain::{Grain, GrainId};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Ids per existence check or bulk fetch
pub const PAGE_SIZE: usize = 100;

/// Existence check over any number of ids
pub async fn check_exist(
    broker: &dyn Broker,
    ids: &[GrainId],
    cancel: &CancellationToken,
) -> Result<HashMap<GrainId, bool>> {
    let mut result = HashMap::with_capacity(ids.len());
    for (page, chunk) in ids.chunks(PAGE_SIZE).enumerate() {
        if cancel.is_cancelled() {
            return Err(BrokerError::Cancelled);
        }
        debug!(page, size = chunk.len(), "Checking grain existence");
        result.extend(broker.check_exist(chunk, cancel).await?);
    }
    Ok(result)
}

/// Bulk fetch over any number of ids
pub async fn pull_grains(
    broker: &dyn Broker,
    ids: &[GrainId],
    cancel: &CancellationToken,
) -> Result<Vec<Grain>> {
    let mut result = Vec::with_capacity(ids.len());
    for (page, chunk) in ids.chunks(PAGE_SIZE).enumerate() {
        if cancel.is_cancelled() {
            return Err(BrokerError::Cancelled);
        }
        debug!(page, size = chunk.len(), "Pulling grains");
        result.extend(broker.pull_grains(chunk, cancel).await?);
    }
    Ok(result)
}
