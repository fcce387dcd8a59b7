//! User configuration (`config.toml` in the platform config directory)
//!
//! Every key is optional:
//!
//! ```toml
//! [http]
//! timeout_secs = 100
//! accept_invalid_certs = false
//!
//! [auth]
//! oidc_client_id = "granary"
//!
//! [log]
//! level = "warn"
//!
//! [snapshot]
//! pretty_json = true
//! ```

use anyhow::{Context, Result};
use broker::HttpOptions;
use journal::JsonFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub auth: AuthConfig,
    pub log: LogConfig,
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 100,
            accept_invalid_certs: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Overrides the client id the broker advertises
    pub oidc_client_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `GRANARY_LOG` is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Indent snapshot files; compact output when false
    pub pretty_json: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { pretty_json: true }
    }
}

impl Config {
    /// Format of every file written into snapshot directories
    pub fn json_format(&self) -> JsonFormat {
        if self.snapshot.pretty_json {
            JsonFormat::default()
        } else {
            JsonFormat::compact()
        }
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: Duration::from_secs(self.http.timeout_secs),
            accept_invalid_certs: self.http.accept_invalid_certs,
            oidc_client_id: self.auth.oidc_client_id.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if !(1..=3600).contains(&self.http.timeout_secs) {
            anyhow::bail!(
                "http.timeout_secs must be between 1 and 3600 (got {})",
                self.http.timeout_secs
            );
        }
        EnvFilter::try_new(&self.log.level)
            .with_context(|| format!("Invalid log.level '{}'", self.log.level))?;
        Ok(())
    }
}

pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("granary").join("config.toml"))
}

/// Load the user configuration, defaults when there is none
pub fn load() -> Result<Config> {
    match config_file_path() {
        Some(path) if path.exists() => load_from(&path),
        _ => Ok(Config::default()),
    }
}

pub fn load_from(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
}

pub fn parse(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}
