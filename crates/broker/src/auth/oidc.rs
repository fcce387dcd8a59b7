use super::{header_value, CredentialPrompt};
use crate::connection::ConnectionSettings;
use crate::error::BrokerError;
use crate::models::AuthConfig;
use crate::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::header::HeaderValue;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const PARAM_ACCESS_TOKEN: &str = "accessToken";
const PARAM_REFRESH_TOKEN: &str = "refreshToken";
const PARAM_EXPIRATION: &str = "expiration";

/// Tokens expiring sooner than this are refreshed first
const REFRESH_MARGIN_SECS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenStatus {
    Missing,
    Valid,
    RefreshRequired,
    Expired,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Bearer tokens issued by the broker's identity provider
#[derive(Debug, Clone, Default)]
pub struct OidcAuthenticator {
    client_id: Option<String>,
}

impl OidcAuthenticator {
    /// `client_id` overrides the one advertised by the broker
    pub fn new(client_id: Option<String>) -> Self {
        Self { client_id }
    }

    pub(super) async fn attach(
        &self,
        settings: &mut ConnectionSettings,
        prompt: &dyn CredentialPrompt,
        http: &reqwest::Client,
        cancel: &CancellationToken,
    ) -> Result<Option<HeaderValue>> {
        let config = settings.auth_config.clone().unwrap_or_default();
        let authority = config.authority.clone().unwrap_or_else(|| settings.broker_url.clone());

        let mut token = settings
            .auth_params
            .get(PARAM_ACCESS_TOKEN)
            .cloned()
            .filter(|t| !t.is_empty());
        let mut status = token_status(settings, Utc::now());
        debug!(?status, "Checked stored OIDC token");

        if status == TokenStatus::RefreshRequired {
            match self.refresh(settings, &config, http, cancel).await {
                Ok(response) => {
                    prompt.message(&format!("Refreshed authentication by {authority}"));
                    token = Some(response.access_token.clone());
                    status = TokenStatus::Valid;
                    if settings.store_credentials {
                        store_tokens(settings, &response);
                    }
                }
                Err(BrokerError::Cancelled) => return Err(BrokerError::Cancelled),
                Err(e) => {
                    warn!(error = %e, "Token refresh failed");
                    status = TokenStatus::Expired;
                }
            }
        }

        if status != TokenStatus::Valid {
            token = prompt.access_token(&authority).filter(|t| !t.is_empty());
            if let Some(issued) = &token {
                if settings.store_credentials {
                    settings
                        .auth_params
                        .insert(PARAM_ACCESS_TOKEN.to_string(), issued.clone());
                    settings.auth_params.remove(PARAM_REFRESH_TOKEN);
                    settings.auth_params.remove(PARAM_EXPIRATION);
                }
            }
        }

        match token {
            Some(token) => header_value("Bearer", &token).map(Some),
            None => Ok(None),
        }
    }

    async fn refresh(
        &self,
        settings: &ConnectionSettings,
        config: &AuthConfig,
        http: &reqwest::Client,
        cancel: &CancellationToken,
    ) -> Result<TokenResponse> {
        let token_url = config
            .token_url
            .clone()
            .ok_or_else(|| BrokerError::Auth("broker advertises no token endpoint".to_string()))?;
        let refresh_token = settings
            .auth_params
            .get(PARAM_REFRESH_TOKEN)
            .cloned()
            .unwrap_or_default();
        let client_id = self
            .client_id
            .clone()
            .or_else(|| config.client_id.clone())
            .unwrap_or_default();

        let request = http.post(&token_url).form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", client_id.as_str()),
        ]);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BrokerError::Cancelled),
            response = request.send() => response.map_err(|source| BrokerError::Transport {
                url: token_url.clone(),
                source,
            })?,
        };
        if !response.status().is_success() {
            return Err(BrokerError::Status {
                url: token_url,
                status: response.status().as_u16(),
                body: String::new(),
            });
        }
        response
            .json::<TokenResponse>()
            .await
            .map_err(|source| BrokerError::Transport {
                url: token_url,
                source,
            })
    }

    pub(super) fn invalidate(&self, settings: &mut ConnectionSettings) -> bool {
        settings.auth_params.remove(PARAM_ACCESS_TOKEN);
        settings.auth_params.remove(PARAM_REFRESH_TOKEN);
        settings.auth_params.remove(PARAM_EXPIRATION);
        true
    }
}

/// A token without a recorded expiration was supplied by hand and is used
/// until the broker rejects it
fn token_status(settings: &ConnectionSettings, now: DateTime<Utc>) -> TokenStatus {
    let params = &settings.auth_params;
    if params.get(PARAM_ACCESS_TOKEN).map_or(true, String::is_empty) {
        return TokenStatus::Missing;
    }
    let Some(expiration) = params.get(PARAM_EXPIRATION).filter(|e| !e.is_empty()) else {
        return TokenStatus::Valid;
    };
    let Ok(expiration) = DateTime::parse_from_rfc3339(expiration) else {
        warn!(expiration = %expiration, "Invalid token expiration time");
        return TokenStatus::Expired;
    };

    let remaining = expiration.with_timezone(&Utc) - now;
    debug!(remaining_secs = remaining.num_seconds(), "Stored token expiration");
    if remaining >= Duration::seconds(REFRESH_MARGIN_SECS) {
        TokenStatus::Valid
    } else if params.get(PARAM_REFRESH_TOKEN).map_or(false, |t| !t.is_empty()) {
        TokenStatus::RefreshRequired
    } else {
        TokenStatus::Expired
    }
}

fn store_tokens(settings: &mut ConnectionSettings, response: &TokenResponse) {
    let params = &mut settings.auth_params;
    params.insert(PARAM_ACCESS_TOKEN.to_string(), response.access_token.clone());
    match &response.refresh_token {
        Some(refresh) => params.insert(PARAM_REFRESH_TOKEN.to_string(), refresh.clone()),
        None => params.remove(PARAM_REFRESH_TOKEN),
    };
    match response.expires_in {
        Some(secs) => params.insert(
            PARAM_EXPIRATION.to_string(),
            (Utc::now() + Duration::seconds(secs)).to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        None => params.remove(PARAM_EXPIRATION),
    };
}
