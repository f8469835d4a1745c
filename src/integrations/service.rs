use super::{
    CallbackQuery, Credentials, FlowState, IntegrationError, IntegrationResult, ItemFetcher, NormalizedItem,
    OAuthFlow, ProviderRegistry, config::FlowConfig, health::IntegrationsHealthChecker,
    provider::ProviderInfo,
};
use crate::{cache::KeyValueCache, error::AppError};
use reqwest::Client;
use std::{collections::HashMap, sync::Arc};

struct Integration {
    flow: OAuthFlow,
    fetcher: ItemFetcher,
}

/// Entry point for the HTTP layer: one flow and fetcher per configured provider
pub struct IntegrationService {
    registry: Arc<ProviderRegistry>,
    integrations: HashMap<String, Integration>,
}

impl IntegrationService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<dyn KeyValueCache>,
        flow_config: &FlowConfig,
    ) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(flow_config.http_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let integrations = registry
            .iter()
            .map(|provider| {
                let integration = Integration {
                    flow: OAuthFlow::new(
                        provider.clone(),
                        cache.clone(),
                        http_client.clone(),
                        flow_config,
                    ),
                    fetcher: ItemFetcher::new(http_client.clone(), provider.clone()),
                };
                (provider.name.clone(), integration)
            })
            .collect();

        Ok(Self {
            registry,
            integrations,
        })
    }

    fn integration(&self, provider: &str) -> IntegrationResult<&Integration> {
        self.integrations
            .get(provider)
            .ok_or_else(|| IntegrationError::UnknownProvider(provider.to_string()))
    }

    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.registry.list()
    }

    pub async fn authorize(
        &self,
        provider: &str,
        user_id: &str,
        org_id: &str,
    ) -> IntegrationResult<String> {
        self.integration(provider)?
            .flow
            .authorize(user_id, org_id)
            .await
    }

    pub async fn callback(
        &self,
        provider: &str,
        query: &CallbackQuery,
    ) -> IntegrationResult<FlowState> {
        self.integration(provider)?.flow.callback(query).await
    }

    pub async fn take_credentials(
        &self,
        provider: &str,
        user_id: &str,
        org_id: &str,
    ) -> IntegrationResult<Credentials> {
        self.integration(provider)?
            .flow
            .credentials()
            .take(user_id, org_id)
            .await
    }

    pub async fn load_items(
        &self,
        provider: &str,
        credentials: &Credentials,
    ) -> IntegrationResult<Vec<NormalizedItem>> {
        self.integration(provider)?
            .fetcher
            .list_items(credentials)
            .await
    }

    pub fn health_checker(&self) -> Arc<IntegrationsHealthChecker> {
        Arc::new(IntegrationsHealthChecker::new(self.registry.clone()))
    }
}
