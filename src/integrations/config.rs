use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::hubspot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "default_state_ttl_secs")]
    pub state_ttl_secs: u64,
    #[serde(default = "default_credentials_ttl_secs")]
    pub credentials_ttl_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_state_ttl_secs() -> u64 {
    600 // 10 minutes
}

fn default_credentials_ttl_secs() -> u64 {
    600 // 10 minutes
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            state_ttl_secs: default_state_ttl_secs(),
            credentials_ttl_secs: default_credentials_ttl_secs(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl FlowConfig {
    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }

    pub fn credentials_ttl(&self) -> Duration {
        Duration::from_secs(self.credentials_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Scopes the user may decline (sent as `optional_scope`)
    #[serde(default)]
    pub optional_scopes: Vec<String>,
    #[serde(default)]
    pub authorization_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub items_url: Option<String>,
    #[serde(default)]
    pub item_properties: Vec<String>,
    #[serde(default)]
    pub use_pkce: Option<bool>,
}

/// Fill in endpoints and scopes for providers we know about
pub fn apply_predefined_provider_defaults(provider_name: &str, provider: &mut ProviderConfig) {
    match provider_name {
        "hubspot" => hubspot::apply_defaults(provider),
        _ => {} // Custom provider, no defaults to apply
    }
}
