//! Show snapshot and connection details

use anyhow::Result;
use broker::Broker;
use cli_lib::{util, Config};
use owo_colors::OwoColorize;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracking::ops::{self, InfoReport};
use tracking::ResultCode;

pub async fn run(
    directory: &Path,
    validate_connection: bool,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<ResultCode> {
    let mut dir = util::open_directory(directory, config)?;
    let client = if validate_connection {
        Some(util::connect_broker(&mut dir, config, cancel).await?)
    } else {
        None
    };

    let report = ops::info(
        &dir,
        client.as_ref().map(|b| b as &dyn Broker),
        cancel,
    )
    .await?;
    print_report(&report);

    Ok(match &report.validation {
        Some(Err(e)) => e.code(),
        _ => ResultCode::Success,
    })
}

fn print_report(report: &InfoReport) {
    println!("{}", "Snapshot Information".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    println!("Directory:     {}", report.path.display().to_string().cyan());
    println!("Version:       {}", report.snapshot.version);
    if let Some(schema) = report.snapshot.schema_version {
        println!("Schema:        {}", schema);
    }
    match &report.anchor {
        Some(anchor) => println!(
            "Anchor:        {} {}",
            anchor.display_path().yellow(),
            format!("({})", anchor.id).dimmed()
        ),
        None => {
            if let Some(id) = report.snapshot.anchor_id() {
                println!("Anchor:        {} {}", id, "(not cached)".dimmed());
            }
        }
    }
    println!("Scope:         {}", report.snapshot.scope);
    println!(
        "Updated:       {} ({})",
        util::format_relative_time(report.snapshot.updated),
        util::format_absolute_time(report.snapshot.updated).dimmed()
    );
    println!("Checkpoints:   {}", report.checkpoints);
    if report.ignores > 0 {
        println!("Ignore rules:  {}", report.ignores);
    }
    println!();

    match &report.connection {
        Some(connection) => {
            println!("Connection:");
            println!("  Broker:      {}", connection.broker_url.cyan());
            println!("  Auth:        {}", connection.auth);
            println!("  Instance:    {}", connection.instance_id);
            println!(
                "  Credentials: {}",
                if connection.has_credentials { "stored" } else { "not stored" }
            );
        }
        None => {
            println!("Connection:    {}", "Not connected".yellow());
            println!("  {}", "Tip: Connect with 'granary connect <url>'".dimmed());
        }
    }

    if let Some(sync) = &report.sync {
        println!();
        println!("Synchronization:");
        println!("  Local:       checkpoint {}", sync.local_ordinal);
        println!("  Shared:      checkpoint {}", sync.shared_ordinal);
        print!("  Last push:   checkpoint {}", sync.last_push);
        if sync.last_push_has_errors {
            println!(" {}", "(with errors)".red());
        } else {
            println!();
        }
        if !sync.in_sync {
            println!("  {}", "Local and shared checkpoints differ".yellow());
        }
    }

    if let Some(validation) = &report.validation {
        println!();
        match validation {
            Ok(info) => println!(
                "Broker check:  {} (API {}, schema {})",
                "OK".green(),
                info.version,
                info.schema_version
            ),
            Err(e) => println!("Broker check:  {} {}", "Failed".red(), e),
        }
    }
}
