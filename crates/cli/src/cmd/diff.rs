//! Show differences between grain versions

use anyhow::Result;
use broker::Broker;
use cli_lib::{diff_utils, util, Config};
use grain::GrainId;
use owo_colors::OwoColorize;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracking::ops::{self, DiffMode};
use tracking::ResultCode;

pub async fn run(
    directory: &Path,
    first: GrainId,
    second: Option<GrainId>,
    mode: DiffMode,
    context: usize,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<ResultCode> {
    let mut dir = util::open_directory(directory, config)?;
    let client = if mode.needs_broker(second.is_some()) {
        Some(util::connect_broker(&mut dir, config, cancel).await?)
    } else {
        None
    };

    let diff = ops::load_diff(
        &dir,
        client.as_ref().map(|b| b as &dyn Broker),
        first,
        second,
        mode,
        cancel,
    )
    .await?;

    if diff.is_identical() {
        println!(
            "{} {} and {} are identical",
            "No differences:".green(),
            diff.left.label(),
            diff.right.label()
        );
        return Ok(ResultCode::Success);
    }
    for side in [&diff.left, &diff.right] {
        if side.text.is_none() {
            println!("{} {} does not exist", "Note:".dimmed(), side.label());
        }
    }
    print!("{}", diff_utils::render_grain_diff(&diff, context));
    let (inserted, deleted) = diff_utils::change_counts(
        diff.left.text.as_deref().unwrap_or_default(),
        diff.right.text.as_deref().unwrap_or_default(),
    );
    println!(
        "{} {}",
        format!("+{inserted}").green(),
        format!("-{deleted}").red()
    );
    Ok(ResultCode::Success)
}
