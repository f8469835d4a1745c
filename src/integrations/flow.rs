use super::{
    Credentials, CredentialStore, FlowState, IntegrationError, IntegrationResult,
    ProviderDescriptor, StateManager, config::FlowConfig, pkce,
};
use crate::cache::KeyValueCache;
use oauth2::{CsrfToken, Scope};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Query parameters the provider appends when redirecting back
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Authorization-code flow for one provider
#[derive(Clone)]
pub struct OAuthFlow {
    provider: Arc<ProviderDescriptor>,
    states: StateManager,
    credentials: CredentialStore,
    http_client: Client,
}

impl OAuthFlow {
    pub fn new(
        provider: Arc<ProviderDescriptor>,
        cache: Arc<dyn KeyValueCache>,
        http_client: Client,
        flow_config: &FlowConfig,
    ) -> Self {
        Self {
            states: StateManager::new(cache.clone(), &provider.name, flow_config.state_ttl()),
            credentials: CredentialStore::new(
                cache,
                &provider.name,
                flow_config.credentials_ttl(),
            ),
            provider,
            http_client,
        }
    }

    pub fn provider(&self) -> &ProviderDescriptor {
        &self.provider
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Start a flow and return the provider consent URL. No network call is
    /// made to the provider.
    pub async fn authorize(&self, user_id: &str, org_id: &str) -> IntegrationResult<String> {
        let result = self.authorization_url(user_id, org_id).await;
        record_outcome(&self.provider.name, "authorize", &result);
        match &result {
            Ok(_) => info!(provider = %self.provider.name, org_id, user_id, "Authorization URL issued"),
            Err(e) => warn!(provider = %self.provider.name, org_id, user_id, "Authorize failed: {}", e),
        }
        result
    }

    async fn authorization_url(&self, user_id: &str, org_id: &str) -> IntegrationResult<String> {
        let start = self.states.begin_flow(user_id, org_id).await?;

        let mut request = self
            .provider
            .oauth_client
            .authorize_url(|| CsrfToken::new(start.encoded_state.clone()))
            .add_scopes(self.provider.scopes.iter().cloned().map(Scope::new));

        if !self.provider.optional_scopes.is_empty() {
            request =
                request.add_extra_param("optional_scope", self.provider.optional_scopes.join(" "));
        }
        if self.provider.use_pkce {
            request = request
                .add_extra_param("code_challenge", start.code_challenge.clone())
                .add_extra_param("code_challenge_method", pkce::CHALLENGE_METHOD);
        }

        let (url, _csrf_token) = request.url();
        Ok(url.to_string())
    }

    /// Finish a flow from the provider's redirect and park the tokens for
    /// one-time pickup. Returns the flow that was completed.
    pub async fn callback(&self, query: &CallbackQuery) -> IntegrationResult<FlowState> {
        let result = self.complete(query).await;
        record_outcome(&self.provider.name, "callback", &result);
        match &result {
            Ok(flow) => info!(
                provider = %self.provider.name,
                org_id = %flow.org_id,
                user_id = %flow.user_id,
                "OAuth callback completed"
            ),
            Err(e) => warn!(
                provider = %self.provider.name,
                error = e.code(),
                "OAuth callback failed: {}",
                e
            ),
        }
        result
    }

    async fn complete(&self, query: &CallbackQuery) -> IntegrationResult<FlowState> {
        if let Some(error) = query.error.as_deref().filter(|error| !error.is_empty()) {
            let message = query
                .error_description
                .as_deref()
                .filter(|description| !description.is_empty())
                .unwrap_or(error);
            return Err(IntegrationError::provider(None, message));
        }

        let encoded_state = query
            .state
            .as_deref()
            .ok_or(IntegrationError::MalformedState)?;
        let received = FlowState::decode(encoded_state)?;
        let (user_id, org_id) = (received.user_id.as_str(), received.org_id.as_str());

        let validated = self.states.validate(encoded_state, user_id, org_id).await?;

        let Some(code) = query.code.as_deref().filter(|code| !code.is_empty()) else {
            self.states.consume(user_id, org_id).await?;
            return Err(IntegrationError::provider(
                None,
                "missing authorization code",
            ));
        };

        let (exchanged, consumed) = tokio::join!(
            self.exchange_code(code, validated.code_verifier.as_deref()),
            self.states.consume(user_id, org_id),
        );
        let credentials = exchanged?;
        consumed?;

        self.credentials.put(user_id, org_id, &credentials).await?;
        Ok(validated.state)
    }

    /// POST the code to the token endpoint and keep the JSON body as-is
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> IntegrationResult<Credentials> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.provider.redirect_uri.as_str()),
            ("client_id", self.provider.client_id.as_str()),
            ("client_secret", self.provider.client_secret.as_str()),
        ];
        if self.provider.use_pkce {
            if let Some(verifier) = code_verifier {
                form.push(("code_verifier", verifier));
            }
        }

        let response = self
            .http_client
            .post(&self.provider.token_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            IntegrationError::provider(
                Some(status.as_u16()),
                format!("Invalid token response: {}", e),
            )
        })?;

        if !status.is_success() {
            return Err(IntegrationError::provider(
                Some(status.as_u16()),
                provider_message(&body),
            ));
        }

        Credentials::from_value(body)
    }
}

/// Best-effort human message from a provider error body
fn provider_message(body: &Value) -> &str {
    ["message", "error_description", "error"]
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_str))
        .unwrap_or("Unknown error")
}

fn record_outcome<T>(provider: &str, stage: &'static str, result: &IntegrationResult<T>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.code(),
    };
    metrics::counter!(
        "integration_flows_total",
        "provider" => provider.to_string(),
        "stage" => stage,
        "outcome" => outcome
    )
    .increment(1);
}
