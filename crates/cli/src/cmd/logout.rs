//! Forget stored broker credentials

use anyhow::Result;
use broker::Authenticator;
use cli_lib::{util, Config};
use owo_colors::OwoColorize;
use std::path::Path;
use tracking::{ops, ResultCode, TrackingError};

pub fn run(directory: &Path, config: &Config) -> Result<ResultCode> {
    let mut dir = util::open_directory(directory, config)?;
    let connection = dir.connection().cloned().ok_or_else(|| TrackingError::SnapshotState {
        path: dir.path().to_path_buf(),
        reason: "not connected to a broker".to_string(),
    })?;
    let authenticator = Authenticator::for_settings(&connection, config.auth.oidc_client_id.clone())
        .map_err(|e| TrackingError::AuthProvider(e.to_string()))?;

    ops::logout(&mut dir, &authenticator)?;
    println!(
        "{} from {}",
        "Logged out".green().bold(),
        connection.broker_url.cyan()
    );
    Ok(ResultCode::Success)
}
