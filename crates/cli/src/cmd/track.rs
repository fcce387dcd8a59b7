//! Start tracking a broker subtree in a new snapshot

use anyhow::Result;
use broker::{AuthScheme, ConnectionSettings, HttpBroker};
use cli_lib::{util, Config, ConsolePrompt};
use grain::{IgnoreFilter, TypeConstraint};
use owo_colors::OwoColorize;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracking::ops::{self, TrackOptions};
use tracking::{ResultCode, SnapshotDirectory};
use uuid::Uuid;

pub fn ignore_filter(grains: Vec<Uuid>, types: Vec<Uuid>, type_names: Vec<String>) -> IgnoreFilter {
    let mut filter = IgnoreFilter::default();
    filter.ids.extend(grains);
    filter.types.extend(types.into_iter().map(TypeConstraint::by_id));
    filter.types.extend(type_names.into_iter().map(TypeConstraint::by_name));
    filter
}

pub async fn run(
    directory: &Path,
    url: &str,
    auth: AuthScheme,
    store_credentials: bool,
    options: TrackOptions,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<ResultCode> {
    let mut dir = util::open_directory(directory, config)?;
    let mut settings = ConnectionSettings::new(url, auth, store_credentials)?;
    let broker = HttpBroker::connect(&mut settings, config.http_options(), &ConsolePrompt, cancel).await?;

    let spinner = util::spinner(format!("Tracking {} from {}", options.anchor, url));
    let result = ops::track(&mut dir, &broker, settings, options, cancel).await;
    spinner.finish_and_clear();
    let outcome = result?;

    print_summary(&dir, &outcome);
    Ok(ResultCode::Success)
}

fn print_summary(dir: &SnapshotDirectory, outcome: &ops::TrackOutcome) {
    println!("{}", "Snapshot created".green().bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("Directory:     {}", dir.path().display().to_string().cyan());
    println!(
        "Anchor:        {} {}",
        outcome.anchor.display_path().yellow(),
        format!("({})", outcome.anchor.id).dimmed()
    );
    if let Some(snapshot) = dir.snapshot() {
        println!("Scope:         {}", snapshot.scope);
    }
    println!("Broker:        {}", outcome.instance_id);
    println!("Grains:        {} stored", outcome.stored);
    if !outcome.ignored.is_empty() {
        println!("Ignored:       {}", outcome.ignored.len().to_string().magenta());
    }
}
