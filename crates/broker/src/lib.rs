//! Broker collaborator: contract, wire models, HTTP client and authentication
//!
//! This crate provides:
//! - The `Broker` trait consumed by the tracking engine
//! - Wire models (server info, import results, feedback, list queries)
//! - `HttpBroker`, the REST implementation
//! - Authenticators (basic credentials, OIDC bearer tokens)
//! - Paged helpers for id-set calls

pub mod auth;
pub mod client;
pub mod connection;
pub mod error;
pub mod http;
pub mod models;
pub mod paged;

// Re-exports
pub use auth::{AuthScheme, Authenticator, CredentialPrompt};
pub use client::Broker;
pub use connection::ConnectionSettings;
pub use error::BrokerError;
pub use http::{HttpBroker, HttpOptions};
pub use models::{
    AuthConfig, DuplicatesStrategy, Feedback, ImportResults, ListQuery, ServerInfo, Severity,
    Version,
};
pub use paged::PAGE_SIZE;

/// Oldest broker API this client can talk to
pub const MINIMUM_API_VERSION: Version = Version::new(0, 1, 19);

/// Result type for broker operations
pub type Result<T> = std::result::Result<T, BrokerError>;
