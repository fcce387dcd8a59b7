//! REST implementation of the broker contract

use crate::auth::{Authenticator, CredentialPrompt};
use crate::client::Broker;
use crate::connection::ConnectionSettings;
use crate::error::BrokerError;
use crate::models::{
    AuthConfig, DuplicatesStrategy, Envelope, ImportRequest, ImportResults, ListQuery, ServerInfo,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use grain::{Grain, GrainId};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Transport options shared by every broker connection
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
    /// Overrides the OIDC client id advertised by the broker
    pub oidc_client_id: Option<String>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(100),
            accept_invalid_certs: false,
            oidc_client_id: None,
        }
    }
}

/// Broker reached over its REST API (`api/marbas/...`)
#[derive(Debug, Clone)]
pub struct HttpBroker {
    settings: ConnectionSettings,
    client: reqwest::Client,
    auth_header: Option<HeaderValue>,
    options: HttpOptions,
}

impl HttpBroker {
    /// Unauthenticated client (enough for `SysInfo`)
    pub fn new(settings: &ConnectionSettings, options: HttpOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs || settings.ignore_ssl_errors)
            .build()
            .map_err(|source| BrokerError::Transport {
                url: settings.broker_url.clone(),
                source,
            })?;
        Ok(Self {
            settings: settings.clone(),
            client,
            auth_header: None,
            options,
        })
    }

    /// Authenticated client
    ///
    /// Fetches the advertised auth config when `settings` has none yet and
    /// writes any newly cached credentials back into `settings`.
    pub async fn connect(
        settings: &mut ConnectionSettings,
        options: HttpOptions,
        prompt: &dyn CredentialPrompt,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let mut broker = Self::new(settings, options)?;
        if settings.auth_config.is_none() {
            settings.auth_config = Some(broker.auth_config(cancel).await);
        }

        let authenticator =
            Authenticator::for_settings(settings, broker.options.oidc_client_id.clone())?;
        broker.auth_header = authenticator
            .attach(settings, prompt, &broker.client, cancel)
            .await?;
        if broker.auth_header.is_none() {
            warn!(url = %settings.broker_url, "No credentials obtained, continuing anonymously");
        }
        broker.settings = settings.clone();
        Ok(broker)
    }

    /// Advertised authentication settings, Basic when the broker is silent
    pub async fn auth_config(&self, cancel: &CancellationToken) -> AuthConfig {
        let fetched = async {
            let url = self.settings.api_url(["SysInfo", "AuthConfig"])?;
            let response = self.send(self.client.get(url.clone()), &url, cancel).await?;
            Self::read_json::<AuthConfig>(response, &url, cancel).await
        };
        match fetched.await {
            Ok(config) => config,
            Err(e) => {
                warn!(url = %self.settings.broker_url, error = %e, "Failed to retrieve auth config");
                AuthConfig::basic()
            }
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    async fn send(
        &self,
        request: RequestBuilder,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let request = match &self.auth_header {
            Some(header) => request.header(AUTHORIZATION, header.clone()),
            None => request,
        };
        debug!(url = %url, "Broker request");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BrokerError::Cancelled),
            response = request.send() => response.map_err(|source| BrokerError::Transport {
                url: url.to_string(),
                source,
            })?,
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(url = %url, status = status.as_u16(), body = %body, "Broker call failed");
        Err(BrokerError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json<T: DeserializeOwned>(
        response: Response,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BrokerError::Cancelled),
            parsed = response.json::<T>() => parsed.map_err(|source| BrokerError::Transport {
                url: url.to_string(),
                source,
            }),
        }
    }

    /// Unwrap a `{ success, yield }` envelope; `None` on an unsuccessful call
    async fn read_envelope<T: DeserializeOwned>(
        response: Response,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<Option<T>> {
        let envelope = Self::read_json::<Envelope<T>>(response, url, cancel).await?;
        Ok(if envelope.success {
            envelope.payload
        } else {
            None
        })
    }

    fn time_param(instant: DateTime<Utc>) -> String {
        instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

#[async_trait]
impl Broker for HttpBroker {
    fn url(&self) -> &str {
        &self.settings.broker_url
    }

    async fn server_info(&self, cancel: &CancellationToken) -> Result<ServerInfo> {
        let url = self.settings.api_url(["SysInfo"])?;
        let response = self.send(self.client.get(url.clone()), &url, cancel).await?;
        Self::read_json(response, &url, cancel).await
    }

    async fn get_grain(&self, id: GrainId, cancel: &CancellationToken) -> Result<Option<Grain>> {
        let url = self.settings.api_url(["Grain".to_string(), id.to_string()])?;
        match self.send(self.client.get(url.clone()), &url, cancel).await {
            Ok(response) => Self::read_envelope(response, &url, cancel).await,
            Err(BrokerError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_grain_by_path(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Grain>> {
        let segments = std::iter::once("Tree").chain(path.split('/').filter(|s| !s.is_empty()));
        let url = self.settings.api_url(segments)?;
        let response = self.send(self.client.get(url.clone()), &url, cancel).await?;
        let found: Option<Vec<Grain>> = Self::read_envelope(response, &url, cancel).await?;
        Ok(found.and_then(|grains| grains.into_iter().next()))
    }

    async fn grain_path(&self, id: GrainId, cancel: &CancellationToken) -> Result<Vec<Grain>> {
        let mut url = self
            .settings
            .api_url(["Grain".to_string(), id.to_string(), "Path".to_string()])?;
        url.query_pairs_mut().append_pair("includeSelf", "true");
        let response = self.send(self.client.get(url.clone()), &url, cancel).await?;
        Ok(Self::read_envelope(response, &url, cancel)
            .await?
            .unwrap_or_default())
    }

    async fn list_grains(
        &self,
        query: &ListQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Grain>> {
        let mut url = self.settings.api_url([
            "Grain".to_string(),
            query.root.to_string(),
            "List".to_string(),
        ])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("sortOptions", r#"{"field":"Path","order":"Asc"}"#);
            if query.recursive {
                pairs.append_pair("recursive", "true");
            }
            if let Some(since) = query.modified_since {
                pairs.append_pair("mTimeFrom", &Self::time_param(since));
            }
            if let Some(until) = query.modified_until {
                pairs.append_pair("mTimeTo", &Self::time_param(until));
            }
        }

        let response = self.send(self.client.get(url.clone()), &url, cancel).await?;
        let mut grains: Vec<Grain> = Self::read_envelope(response, &url, cancel)
            .await?
            .unwrap_or_default();
        // The broker's lower bound is inclusive
        grains.retain(|g| query.accepts(g.m_time));

        if query.include_root && !grains.iter().any(|g| g.id == query.root) {
            if let Some(root) = self.get_grain(query.root, cancel).await? {
                if query.accepts(root.m_time) {
                    grains.insert(0, root);
                }
            }
        }
        Ok(grains)
    }

    async fn check_exist(
        &self,
        ids: &[GrainId],
        cancel: &CancellationToken,
    ) -> Result<HashMap<GrainId, bool>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let url = self.settings.api_url(["Grain", "VerifyExist"])?;
        let response = self
            .send(self.client.post(url.clone()).json(ids), &url, cancel)
            .await?;
        let found: HashMap<GrainId, bool> = Self::read_envelope(response, &url, cancel)
            .await?
            .ok_or_else(|| BrokerError::UnexpectedResponse {
                url: url.to_string(),
            })?;

        let mut result: HashMap<GrainId, bool> = ids.iter().map(|id| (*id, false)).collect();
        result.extend(found);
        Ok(result)
    }

    async fn pull_grains(
        &self,
        ids: &[GrainId],
        cancel: &CancellationToken,
    ) -> Result<Vec<Grain>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.settings.api_url(["Transport", "Out"])?;
        let response = self
            .send(self.client.post(url.clone()).json(ids), &url, cancel)
            .await?;
        Ok(Self::read_envelope(response, &url, cancel)
            .await?
            .unwrap_or_default())
    }

    async fn push_grains(
        &self,
        store: &[Grain],
        delete: &BTreeSet<GrainId>,
        strategy: DuplicatesStrategy,
        cancel: &CancellationToken,
    ) -> Result<ImportResults> {
        if cancel.is_cancelled() {
            return Err(BrokerError::Cancelled);
        }
        if store.is_empty() && delete.is_empty() {
            return Ok(ImportResults::nothing_to_export());
        }

        let body = ImportRequest {
            grains: store,
            grains_to_delete: (!delete.is_empty()).then(|| delete.iter().copied().collect()),
            duplicates_handling: strategy,
        };
        let url = self.settings.api_url(["Transport", "In"])?;
        let response = self
            .send(self.client.put(url.clone()).json(&body), &url, cancel)
            .await?;
        Self::read_envelope(response, &url, cancel)
            .await?
            .ok_or_else(|| BrokerError::UnexpectedResponse {
                url: url.to_string(),
            })
    }
}
