//! Authentication against the broker
//!
//! Two schemes are supported:
//! 1. Basic - user name and password, cached as a base64 token
//! 2. OIDC - bearer token, refreshed through the advertised token endpoint
//!
//! `AuthScheme::Auto` picks whichever the broker advertises.

mod basic;
mod oidc;

pub use basic::BasicAuthenticator;
pub use oidc::OidcAuthenticator;

use crate::connection::ConnectionSettings;
use crate::error::BrokerError;
use crate::Result;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

/// Configured authentication scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AuthScheme {
    #[default]
    Auto,
    Basic,
    #[serde(rename = "OIDC", alias = "Oidc")]
    Oidc,
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthScheme::Auto => "Auto",
            AuthScheme::Basic => "Basic",
            AuthScheme::Oidc => "OIDC",
        })
    }
}

impl FromStr for AuthScheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(AuthScheme::Auto),
            "basic" => Ok(AuthScheme::Basic),
            "oidc" => Ok(AuthScheme::Oidc),
            _ => Err(format!("unknown authentication scheme '{s}'")),
        }
    }
}

/// Operator interaction needed to obtain credentials
pub trait CredentialPrompt: Send + Sync {
    fn user_name(&self) -> Option<String>;

    fn password(&self) -> Option<String>;

    /// Ask for a bearer token issued by `authority`
    fn access_token(&self, authority: &str) -> Option<String>;

    fn message(&self, text: &str);
}

/// Closed set of authenticators
#[derive(Debug, Clone)]
pub enum Authenticator {
    Basic(BasicAuthenticator),
    Oidc(OidcAuthenticator),
}

impl Authenticator {
    /// Resolve the authenticator for a connection
    ///
    /// An explicit scheme must agree with what the broker advertises;
    /// `Auto` follows the broker and falls back to Basic.
    pub fn for_settings(settings: &ConnectionSettings, oidc_client_id: Option<String>) -> Result<Self> {
        let advertised = settings
            .auth_config
            .as_ref()
            .map(|config| config.schema.as_str())
            .filter(|schema| !schema.is_empty())
            .and_then(|schema| schema.parse::<AuthScheme>().ok());

        let scheme = match (settings.auth, advertised) {
            (AuthScheme::Auto, Some(advertised)) => advertised,
            (AuthScheme::Auto, None) => AuthScheme::Basic,
            (configured, Some(advertised)) if configured != advertised => {
                return Err(BrokerError::Auth(format!(
                    "broker authentication scheme {advertised} is incompatible with configured {configured}"
                )));
            }
            (configured, _) => configured,
        };

        Ok(match scheme {
            AuthScheme::Oidc => Authenticator::Oidc(OidcAuthenticator::new(oidc_client_id)),
            _ => Authenticator::Basic(BasicAuthenticator),
        })
    }

    pub fn scheme(&self) -> AuthScheme {
        match self {
            Authenticator::Basic(_) => AuthScheme::Basic,
            Authenticator::Oidc(_) => AuthScheme::Oidc,
        }
    }

    /// Obtain an `Authorization` header value, caching credentials in
    /// `settings` when it asks for that
    ///
    /// `Ok(None)` means no credentials could be obtained.
    pub async fn attach(
        &self,
        settings: &mut ConnectionSettings,
        prompt: &dyn CredentialPrompt,
        http: &reqwest::Client,
        cancel: &CancellationToken,
    ) -> Result<Option<HeaderValue>> {
        match self {
            Authenticator::Basic(auth) => auth.attach(settings, prompt),
            Authenticator::Oidc(auth) => auth.attach(settings, prompt, http, cancel).await,
        }
    }

    /// Forget cached credentials
    pub fn invalidate(&self, settings: &mut ConnectionSettings) -> bool {
        match self {
            Authenticator::Basic(auth) => auth.invalidate(settings),
            Authenticator::Oidc(auth) => auth.invalidate(settings),
        }
    }
}

pub(crate) fn header_value(scheme: &str, credential: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("{scheme} {credential}"))
        .map_err(|_| BrokerError::Auth("credential contains invalid characters".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}
