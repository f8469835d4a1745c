use super::ProviderRegistry;
use crate::health::{HealthCheckResult, HealthChecker};
use std::sync::Arc;

/// Reports providers that are routed but missing client credentials
pub struct IntegrationsHealthChecker {
    registry: Arc<ProviderRegistry>,
}

impl IntegrationsHealthChecker {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait::async_trait]
impl HealthChecker for IntegrationsHealthChecker {
    fn name(&self) -> &str {
        "integrations"
    }

    async fn check(&self) -> HealthCheckResult {
        if self.registry.is_empty() {
            return HealthCheckResult::degraded_with_details(
                "No integration providers configured".to_string(),
                serde_json::json!({
                    "provider_count": 0,
                    "configured_providers": []
                }),
            );
        }

        let (configured, misconfigured): (Vec<_>, Vec<_>) = self
            .registry
            .iter()
            .partition(|provider| provider.is_configured());
        let configured: Vec<&str> = configured.iter().map(|p| p.name.as_str()).collect();
        let misconfigured: Vec<&str> = misconfigured.iter().map(|p| p.name.as_str()).collect();

        if misconfigured.is_empty() {
            HealthCheckResult::healthy_with_details(serde_json::json!({
                "provider_count": self.registry.len(),
                "configured_providers": configured
            }))
        } else {
            HealthCheckResult::degraded_with_details(
                format!(
                    "Providers missing client credentials: {}",
                    misconfigured.join(", ")
                ),
                serde_json::json!({
                    "provider_count": self.registry.len(),
                    "configured_providers": configured,
                    "misconfigured_providers": misconfigured
                }),
            )
        }
    }

    fn info(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "service": "Integration providers",
            "providers": self.registry.list()
        }))
    }
}
