//! Send local changes to the broker

use anyhow::Result;
use broker::DuplicatesStrategy;
use cli_lib::{util, Config};
use owo_colors::OwoColorize;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracking::ops::{self, PushOptions, PushOutcome, PushStatus};
use tracking::ResultCode;

pub async fn run(
    directory: &Path,
    starting_checkpoint: Option<u32>,
    strategy: DuplicatesStrategy,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<ResultCode> {
    let mut dir = util::open_directory(directory, config)?;
    let broker = util::connect_broker(&mut dir, config, cancel).await?;

    let options = PushOptions {
        starting_checkpoint,
        strategy,
    };
    let spinner = util::spinner("Pushing changes");
    let result = ops::push(&mut dir, &broker, options, cancel).await;
    spinner.finish_and_clear();

    print_outcome(&result?);
    Ok(ResultCode::Success)
}

pub fn print_outcome(outcome: &PushOutcome) {
    match outcome.status {
        PushStatus::UpToDate => println!("{}", "Broker is up to date".green()),
        PushStatus::NothingToPush => println!("{}", "Nothing to push".dimmed()),
        PushStatus::Pushed => {
            println!(
                "{} {} stored, {} deleted (through checkpoint {})",
                "Pushed".green().bold(),
                outcome.stored.len(),
                outcome.deleted.len(),
                outcome.ordinal
            );
            if let Some(results) = &outcome.results {
                for feedback in &results.feedback {
                    let line = format!("  {:?}: {}", feedback.feedback_type, feedback.message);
                    if feedback.is_error() {
                        println!("{}", line.red());
                    } else {
                        println!("{}", line.yellow());
                    }
                }
                if results.has_errors() {
                    println!(
                        "{}",
                        "The broker reported errors; the next push resends this batch".yellow()
                    );
                }
            }
        }
    }
    if !outcome.stale.is_empty() {
        println!(
            "{} {} recorded grains were missing locally and dropped from the log",
            "Note:".dimmed(),
            outcome.stale.len()
        );
    }
}
