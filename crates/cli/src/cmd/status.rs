//! Compare the snapshot with the broker

use anyhow::Result;
use cli_lib::{util, Config};
use owo_colors::OwoColorize;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracking::ops::{self, StatusEntry, StatusOptions, StatusReport};
use tracking::ResultCode;

pub async fn run(
    directory: &Path,
    show_all: bool,
    assume_reset: bool,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<ResultCode> {
    let mut dir = util::open_directory(directory, config)?;
    let broker = util::connect_broker(&mut dir, config, cancel).await?;

    let spinner = util::spinner("Comparing with broker");
    let result = ops::status(&dir, &broker, StatusOptions { assume_reset }, cancel).await;
    spinner.finish_and_clear();
    let report = result?;

    print_report(&report, show_all);
    Ok(report.result_code())
}

fn print_report(report: &StatusReport, show_all: bool) {
    println!("{}", "Snapshot Status".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    print!(
        "Checkpoint:    local {} / shared {}",
        report.local_ordinal, report.shared_ordinal
    );
    if report.in_sync {
        println!();
    } else {
        println!(" {}", "(out of sync, push or pull to reconcile)".yellow());
    }
    println!();

    let entries: Vec<&StatusEntry> = if show_all {
        report.entries.iter().collect()
    } else {
        report.changed().collect()
    };
    if entries.is_empty() {
        println!("{}", "Nothing to report, snapshot and broker agree".green());
        return;
    }

    println!("{:<10} {:<10} {}", "Local", "Broker", "Grain");
    for entry in entries {
        let subject = match &entry.path {
            Some(path) => format!("{} {}", path, format!("({})", entry.id).dimmed()),
            None => entry.id.to_string(),
        };
        println!(
            "{:<10} {:<10} {}",
            pad(util::status_label(entry.local), &format!("{:?}", entry.local)),
            pad(util::status_label(entry.broker), &format!("{:?}", entry.broker)),
            subject
        );
    }

    if report.entries.iter().any(StatusEntry::is_conflict) {
        println!();
        println!(
            "{}",
            "Grains changed on both sides will prompt for a resolution on pull".yellow()
        );
    }
}

/// Right-pad a colored label by its visible width
fn pad(colored: String, plain: &str) -> String {
    let fill = 10usize.saturating_sub(plain.len());
    format!("{colored}{}", " ".repeat(fill))
}
