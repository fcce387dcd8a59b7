//! Connect an existing snapshot to a broker

use anyhow::Result;
use broker::{AuthScheme, ConnectionSettings, HttpBroker};
use cli_lib::{util, Config, ConsolePrompt};
use owo_colors::OwoColorize;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracking::{ops, Adopt, ResultCode};

pub async fn run(
    directory: &Path,
    url: &str,
    auth: AuthScheme,
    store_credentials: bool,
    adopt_checkpoint: i64,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<ResultCode> {
    let adopt = Adopt::from_arg(adopt_checkpoint)?;
    let mut dir = util::open_directory(directory, config)?;
    let mut settings = ConnectionSettings::new(url, auth, store_credentials)?;
    let broker = HttpBroker::connect(&mut settings, config.http_options(), &ConsolePrompt, cancel).await?;

    let info = ops::connect(&mut dir, &broker, settings, adopt, cancel).await?;

    println!(
        "{} {} to {}",
        "Connected".green().bold(),
        dir.path().display().to_string().cyan(),
        url.cyan()
    );
    println!("  Broker:      {} (API {})", info.instance_id, info.version);
    if let Ok(local) = dir.local_checkpoint() {
        println!("  Checkpoint:  {}", local.ordinal);
    }
    Ok(ResultCode::Success)
}
