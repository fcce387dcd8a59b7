use thiserror::Error;

/// Broker communication failures
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}{}", if body.is_empty() { String::new() } else { format!(": {body}") })]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("{url} did not return the expected result")]
    UnexpectedResponse { url: String },

    #[error("invalid broker URL '{0}'")]
    InvalidUrl(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl BrokerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BrokerError::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BrokerError::Status { status: 404, .. })
    }
}
