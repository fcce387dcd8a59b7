use super::{header_value, CredentialPrompt};
use crate::connection::ConnectionSettings;
use crate::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::HeaderValue;
use tracing::debug;

const PARAM_TOKEN: &str = "token";

/// HTTP basic credentials
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAuthenticator;

impl BasicAuthenticator {
    pub(super) fn attach(
        &self,
        settings: &mut ConnectionSettings,
        prompt: &dyn CredentialPrompt,
    ) -> Result<Option<HeaderValue>> {
        if let Some(token) = settings.auth_params.get(PARAM_TOKEN).filter(|t| !t.is_empty()) {
            debug!("Using stored basic credentials");
            return header_value("Basic", token).map(Some);
        }

        let Some(user) = prompt.user_name().filter(|u| !u.is_empty()) else {
            return Ok(None);
        };
        let Some(password) = prompt.password().filter(|p| !p.is_empty()) else {
            return Ok(None);
        };
        let token = encode(&user, &password);

        if settings.store_credentials {
            settings
                .auth_params
                .insert(PARAM_TOKEN.to_string(), token.clone());
        }
        header_value("Basic", &token).map(Some)
    }

    pub(super) fn invalidate(&self, settings: &mut ConnectionSettings) -> bool {
        settings.auth_params.remove(PARAM_TOKEN);
        true
    }
}

fn encode(user: &str, password: &str) -> String {
    STANDARD.encode(format!("{user}:{password}"))
}
