//! OAuth2 account linking for third-party providers
//!
//! A flow runs in two requests. `authorize` caches a CSRF state token and a
//! PKCE verifier and hands back the provider's consent URL; `callback` checks
//! the returned state against the cache, exchanges the code for tokens and
//! parks them in a [`CredentialStore`] for exactly one pickup. The stored
//! credentials are then used by [`ItemFetcher`] to page through the provider's
//! records.

pub mod config;
pub mod credentials;
pub mod flow;
pub mod health;
pub mod hubspot;
pub mod items;
pub mod pkce;
pub mod provider;
pub mod service;
pub mod state;

pub use credentials::{CredentialStore, Credentials};
pub use flow::{CallbackQuery, OAuthFlow};
pub use items::{ItemFetcher, NormalizedItem};
pub use provider::{ProviderDescriptor, ProviderRegistry};
pub use service::IntegrationService;
pub use state::{FlowState, StateManager};

use crate::cache::CacheError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("Provider error: {message}")]
    Provider { status: Option<u16>, message: String },
    #[error("Malformed state parameter")]
    MalformedState,
    #[error("State does not match or has expired")]
    StateNotFound,
    #[error("State does not match")]
    StateMismatch,
    #[error("No credentials found")]
    CredentialsNotFound,
    #[error("Credentials do not contain an access token")]
    MissingAccessToken,
    #[error("Malformed credentials: {0}")]
    MalformedCredentials(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("Unknown integration provider: {0}")]
    UnknownProvider(String),
}

impl IntegrationError {
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        IntegrationError::Provider {
            status,
            message: message.into(),
        }
    }

    /// Stable machine-readable code for API responses and metrics labels
    pub fn code(&self) -> &'static str {
        match self {
            IntegrationError::Provider { .. } => "provider_error",
            IntegrationError::MalformedState => "malformed_state",
            IntegrationError::StateNotFound => "state_not_found",
            IntegrationError::StateMismatch => "state_mismatch",
            IntegrationError::CredentialsNotFound => "credentials_not_found",
            IntegrationError::MissingAccessToken => "missing_access_token",
            IntegrationError::MalformedCredentials(_) => "malformed_credentials",
            IntegrationError::Transport(_) => "transport_error",
            IntegrationError::Cache(_) => "cache_error",
            IntegrationError::UnknownProvider(_) => "unknown_provider",
        }
    }
}

impl From<reqwest::Error> for IntegrationError {
    fn from(err: reqwest::Error) -> Self {
        IntegrationError::Transport(err.to_string())
    }
}

pub type IntegrationResult<T> = Result<T, IntegrationError>;

/// Kinds of transient entries a flow writes to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    State,
    Verifier,
    Credentials,
}

impl EntryKind {
    fn as_str(self) -> &'static str {
        match self {
            EntryKind::State => "state",
            EntryKind::Verifier => "verifier",
            EntryKind::Credentials => "credentials",
        }
    }
}

/// `{provider}:{kind}:{org_id}:{user_id}`, with both ids form-encoded so a
/// `:` inside an id can never shift the segment boundary
pub(crate) fn cache_key(provider: &str, kind: EntryKind, org_id: &str, user_id: &str) -> String {
    format!(
        "{}:{}:{}:{}",
        provider,
        kind.as_str(),
        key_segment(org_id),
        key_segment(user_id)
    )
}

fn key_segment(id: &str) -> String {
    url::form_urlencoded::byte_serialize(id.as_bytes()).collect()
}
