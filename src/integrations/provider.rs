use super::config::{ProviderConfig, apply_predefined_provider_defaults};
use super::items::NormalizedItem;
use super::{IntegrationError, IntegrationResult, hubspot};
use config::ConfigError;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RedirectUrl, TokenUrl,
    basic::BasicClient,
};
use serde::Serialize;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

// Avoid oauth2 type madness
pub type Oauth2Client =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Turns one raw list record into a [`NormalizedItem`]
pub type Normalizer = fn(&Value) -> NormalizedItem;

/// Record normalizers compiled into this build
fn normalizer_for(provider_name: &str) -> Option<Normalizer> {
    match provider_name {
        hubspot::NAME => Some(hubspot::normalize_contact),
        _ => None,
    }
}

/// Everything the generic flow and fetcher need to talk to one provider
#[derive(Clone)]
pub struct ProviderDescriptor {
    pub name: String,
    pub display_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_url: String,
    pub items_url: String,
    pub scopes: Vec<String>,
    pub optional_scopes: Vec<String>,
    pub item_properties: Vec<String>,
    pub use_pkce: bool,
    pub normalize: Normalizer,
    pub oauth_client: Oauth2Client,
}

impl ProviderDescriptor {
    /// Resolve a configured provider. `base_url` is this service's public
    /// origin, used to build the callback URL.
    pub fn from_config(
        name: &str,
        provider: &ProviderConfig,
        base_url: &str,
    ) -> Result<Self, ConfigError> {
        let mut provider = provider.clone();
        apply_predefined_provider_defaults(name, &mut provider);

        let normalize = normalizer_for(name).ok_or_else(|| {
            ConfigError::Message(format!(
                "No record normalizer available for integration provider '{}'",
                name
            ))
        })?;

        let required = |field: &str, value: Option<String>| {
            value.filter(|v| !v.is_empty()).ok_or_else(|| {
                ConfigError::Message(format!(
                    "{} not configured for integration provider '{}'",
                    field, name
                ))
            })
        };
        let authorization_url = required("authorization_url", provider.authorization_url)?;
        let token_url = required("token_url", provider.token_url)?;
        let items_url = required("items_url", provider.items_url)?;

        let redirect_uri = format!(
            "{}/integrations/{}/oauth2callback",
            base_url.trim_end_matches('/'),
            name
        );

        let invalid = |field: &str, e: oauth2::url::ParseError| {
            ConfigError::Message(format!(
                "Invalid {} for integration provider '{}': {}",
                field, name, e
            ))
        };
        let oauth_client = BasicClient::new(ClientId::new(provider.client_id.clone()))
            .set_client_secret(ClientSecret::new(provider.client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(authorization_url).map_err(|e| invalid("authorization_url", e))?,
            )
            .set_token_uri(TokenUrl::new(token_url.clone()).map_err(|e| invalid("token_url", e))?)
            .set_redirect_uri(
                RedirectUrl::new(redirect_uri.clone()).map_err(|e| invalid("base_url", e))?,
            );

        Ok(Self {
            name: name.to_string(),
            display_name: provider.display_name.unwrap_or_else(|| name.to_string()),
            client_id: provider.client_id,
            client_secret: provider.client_secret,
            redirect_uri,
            token_url,
            items_url,
            scopes: provider.scopes,
            optional_scopes: provider.optional_scopes,
            item_properties: provider.item_properties,
            use_pkce: provider.use_pkce.unwrap_or(false),
            normalize,
            oauth_client,
        })
    }

    /// Client credentials are present
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("token_url", &self.token_url)
            .field("items_url", &self.items_url)
            .field("use_pkce", &self.use_pkce)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub display_name: String,
    pub scopes: Vec<String>,
    pub optional_scopes: Vec<String>,
}

/// All providers resolved from configuration, keyed by route name
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<ProviderDescriptor>>,
}

impl ProviderRegistry {
    pub fn from_config(
        providers: &HashMap<String, ProviderConfig>,
        base_url: &str,
    ) -> Result<Self, ConfigError> {
        let providers = providers
            .iter()
            .map(|(name, provider)| {
                ProviderDescriptor::from_config(name, provider, base_url)
                    .map(|descriptor| (name.clone(), Arc::new(descriptor)))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(Self { providers })
    }

    pub fn get(&self, name: &str) -> IntegrationResult<Arc<ProviderDescriptor>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| IntegrationError::UnknownProvider(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ProviderDescriptor>> {
        self.providers.values()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn list(&self) -> Vec<ProviderInfo> {
        self.iter()
            .map(|p| ProviderInfo {
                name: p.name.clone(),
                display_name: p.display_name.clone(),
                scopes: p.scopes.clone(),
                optional_scopes: p.optional_scopes.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hubspot_config() -> ProviderConfig {
        ProviderConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_hubspot_descriptor_from_defaults() {
        let descriptor =
            ProviderDescriptor::from_config("hubspot", &hubspot_config(), "http://localhost:8000/")
                .unwrap();

        assert_eq!(descriptor.display_name, "HubSpot");
        assert_eq!(
            descriptor.redirect_uri,
            "http://localhost:8000/integrations/hubspot/oauth2callback"
        );
        assert_eq!(descriptor.token_url, "https://api.hubapi.com/oauth/v1/token");
        assert!(!descriptor.use_pkce);
        assert!(descriptor.is_configured());
    }

    #[test]
    fn test_provider_without_normalizer_is_rejected() {
        let config = ProviderConfig {
            authorization_url: Some("https://example.com/auth".to_string()),
            token_url: Some("https://example.com/token".to_string()),
            items_url: Some("https://example.com/items".to_string()),
            ..Default::default()
        };
        let err = ProviderDescriptor::from_config("notion", &config, "http://localhost").unwrap_err();
        assert!(err.to_string().contains("normalizer"));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let config = ProviderConfig {
            token_url: Some("not a url".to_string()),
            ..hubspot_config()
        };
        let err = ProviderDescriptor::from_config("hubspot", &config, "http://localhost").unwrap_err();
        assert!(err.to_string().contains("token_url"));
    }

    #[test]
    fn test_missing_credentials_is_not_configured() {
        let descriptor =
            ProviderDescriptor::from_config("hubspot", &ProviderConfig::default(), "http://x")
                .unwrap();
        assert!(!descriptor.is_configured());
    }

    #[test]
    fn test_registry_lookup() {
        let providers = HashMap::from([("hubspot".to_string(), hubspot_config())]);
        let registry = ProviderRegistry::from_config(&providers, "http://localhost:8000").unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("hubspot").unwrap().name, "hubspot");
        assert!(matches!(
            registry.get("airtable"),
            Err(IntegrationError::UnknownProvider(name)) if name == "airtable"
        ));

        let listed = registry.list();
        assert_eq!(listed[0].display_name, "HubSpot");
        assert_eq!(listed[0].scopes, vec!["oauth".to_string()]);
    }
}
