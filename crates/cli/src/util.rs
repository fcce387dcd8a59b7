//! Shared utilities for CLI commands

use crate::config::Config;
use crate::prompt::ConsolePrompt;
use anyhow::{Context, Result};
use broker::{BrokerError, HttpBroker};
use chrono::{DateTime, Utc};
use grain::TrackingStatus;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracking::{ResultCode, SnapshotDirectory, TrackingError};

/// Snapshot directory argument, current directory by default
pub fn resolve_directory(directory: Option<PathBuf>) -> Result<PathBuf> {
    match directory {
        Some(path) => Ok(path),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

pub fn open_directory(path: &Path, config: &Config) -> Result<SnapshotDirectory> {
    Ok(SnapshotDirectory::open(path, config.json_format())?)
}

/// Authenticated broker for a connected snapshot
///
/// Credentials obtained on the way are written back to the local state.
pub async fn connect_broker(
    dir: &mut SnapshotDirectory,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<HttpBroker> {
    let mut settings = dir
        .connection()
        .cloned()
        .ok_or_else(|| TrackingError::SnapshotState {
            path: dir.path().to_path_buf(),
            reason: "not connected to a broker".to_string(),
        })?;
    let broker = HttpBroker::connect(&mut settings, config.http_options(), &ConsolePrompt, cancel).await?;
    if let Some(connection) = dir.connection_mut() {
        *connection = settings;
    }
    dir.store_local_state(false)?;
    Ok(broker)
}

/// Process exit code for a failed command
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let code = if let Some(err) = err.downcast_ref::<TrackingError>() {
        err.code()
    } else if let Some(err) = err.downcast_ref::<BrokerError>() {
        match err {
            BrokerError::InvalidUrl(_) => ResultCode::ParameterError,
            BrokerError::Auth(_) => ResultCode::AuthProviderError,
            _ => ResultCode::BrokerConnectionError,
        }
    } else if err.downcast_ref::<journal::JournalError>().is_some() {
        ResultCode::SnapshotStateError
    } else {
        ResultCode::ParameterError
    };
    code.as_i32()
}

pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Colored one-word status
pub fn status_label(status: TrackingStatus) -> String {
    let label = format!("{status:?}");
    match status {
        TrackingStatus::Uptodate => label.dimmed().to_string(),
        TrackingStatus::New => label.green().to_string(),
        TrackingStatus::Modified => label.yellow().to_string(),
        TrackingStatus::Deleted | TrackingStatus::Missing => label.red().to_string(),
        TrackingStatus::Ignored | TrackingStatus::Obscure => label.magenta().to_string(),
    }
}

/// Format timestamp as relative time ("2 hours ago")
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    let seconds = (Utc::now() - ts).num_seconds();
    if seconds < 0 {
        "in the future".to_string()
    } else if seconds < 60 {
        format!("{} seconds ago", seconds)
    } else if seconds < 3600 {
        format!("{} minutes ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours ago", seconds / 3600)
    } else if seconds < 604800 {
        format!("{} days ago", seconds / 86400)
    } else {
        format!("{} weeks ago", seconds / 604800)
    }
}

/// Format timestamp as absolute time ("2024-01-03 14:30:00")
pub fn format_absolute_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
