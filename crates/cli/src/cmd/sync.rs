//! Push local changes, then pull broker changes

use crate::cmd::{pull, push};
use anyhow::Result;
use broker::DuplicatesStrategy;
use cli_lib::{util, Config, ConsoleResolver};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracking::ops::{self, PullOptions, PushOptions};
use tracking::ResultCode;

pub async fn run(
    directory: &Path,
    starting_checkpoint: Option<u32>,
    strategy: DuplicatesStrategy,
    overwrite: bool,
    force_checkpoint: bool,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<ResultCode> {
    let mut dir = util::open_directory(directory, config)?;
    let broker = util::connect_broker(&mut dir, config, cancel).await?;
    let mut resolver = ConsoleResolver::new(dir.format());

    let push_options = PushOptions {
        starting_checkpoint,
        strategy,
    };
    let pull_options = PullOptions {
        overwrite,
        force_checkpoint,
    };
    let outcome = ops::sync(
        &mut dir,
        &broker,
        &mut resolver,
        push_options,
        pull_options,
        cancel,
    )
    .await?;

    push::print_outcome(&outcome.push);
    pull::print_outcome(&outcome.pull);
    Ok(ResultCode::Success)
}
