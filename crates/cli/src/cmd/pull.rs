//! Bring broker changes into the snapshot

use anyhow::Result;
use cli_lib::{util, Config, ConsoleResolver};
use owo_colors::OwoColorize;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracking::ops::{self, PullOptions, PullOutcome};
use tracking::ResultCode;

pub async fn run(
    directory: &Path,
    overwrite: bool,
    force_checkpoint: bool,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<ResultCode> {
    let mut dir = util::open_directory(directory, config)?;
    let broker = util::connect_broker(&mut dir, config, cancel).await?;
    let mut resolver = ConsoleResolver::new(dir.format());

    let options = PullOptions {
        overwrite,
        force_checkpoint,
    };
    let outcome = ops::pull(&mut dir, &broker, &mut resolver, options, cancel).await?;
    print_outcome(&outcome);
    Ok(ResultCode::Success)
}

pub fn print_outcome(outcome: &PullOutcome) {
    if outcome.is_noop() {
        println!("{}", "Snapshot is up to date".green());
        return;
    }
    for grain in &outcome.stored {
        println!("  {} {}", "M".yellow(), grain.display_path());
    }
    for grain in &outcome.purged {
        println!("  {} {}", "D".red(), grain.display_path());
    }
    for path in &outcome.side_files {
        println!("  {} {}", "C".magenta(), path.display());
    }
    print!(
        "{} {} changes",
        "Pulled".green().bold(),
        outcome.changes
    );
    match outcome.ordinal {
        Some(ordinal) => println!(" into checkpoint {ordinal}"),
        None => println!(),
    }
    if !outcome.deleted_locally.is_empty() {
        println!(
            "{} {} grains deleted locally were left out",
            "Note:".dimmed(),
            outcome.deleted_locally.len()
        );
    }
}
