//! Push, then pull

use crate::directory::SnapshotDirectory;
use crate::ops::pull::{pull, PullOptions, PullOutcome};
use crate::ops::push::{push, PushOptions, PushOutcome};
use crate::resolver::ConflictResolver;
use crate::Result;
use broker::Broker;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub push: PushOutcome,
    pub pull: PullOutcome,
}

/// A failed push leaves the directory untouched and skips the pull
pub async fn sync(
    dir: &mut SnapshotDirectory,
    broker: &dyn Broker,
    resolver: &mut dyn ConflictResolver,
    push_options: PushOptions,
    pull_options: PullOptions,
    cancel: &CancellationToken,
) -> Result<SyncOutcome> {
    let push = push(dir, broker, push_options, cancel).await?;
    let pull = pull(dir, broker, resolver, pull_options, cancel).await?;
    Ok(SyncOutcome { push, pull })
}
