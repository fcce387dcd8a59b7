//! Broker connection settings kept in the local state file

use crate::auth::AuthScheme;
use crate::error::BrokerError;
use crate::models::AuthConfig;
use crate::Result;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Path prefix of every broker API route
pub const API_PREFIX: &str = "api/marbas/";

/// Where and how to reach a broker
///
/// Cached credentials live in `auth_params` and are never interpreted
/// outside the authenticator that wrote them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSettings {
    pub broker_url: String,
    #[serde(default)]
    pub ignore_ssl_errors: bool,
    #[serde(default)]
    pub auth: AuthScheme,
    #[serde(default)]
    pub store_credentials: bool,
    #[serde(default)]
    pub auth_params: BTreeMap<String, String>,
    /// Fetched from the broker on demand, never persisted
    #[serde(skip)]
    pub auth_config: Option<AuthConfig>,
}

impl ConnectionSettings {
    /// Validate and normalize a broker URL (always ends with `/`)
    pub fn new(broker_url: &str, auth: AuthScheme, store_credentials: bool) -> Result<Self> {
        let mut url =
            Url::parse(broker_url).map_err(|_| BrokerError::InvalidUrl(broker_url.to_string()))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(BrokerError::InvalidUrl(broker_url.to_string()));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            broker_url: url.to_string(),
            ignore_ssl_errors: false,
            auth,
            store_credentials,
            auth_params: BTreeMap::new(),
            auth_config: None,
        })
    }

    /// Absolute URL of an API route, segments percent-encoded
    pub fn api_url<I, S>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = Url::parse(&self.broker_url)
            .and_then(|base| base.join(API_PREFIX))
            .map_err(|_| BrokerError::InvalidUrl(self.broker_url.clone()))?;
        url.path_segments_mut()
            .map_err(|_| BrokerError::InvalidUrl(self.broker_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}
