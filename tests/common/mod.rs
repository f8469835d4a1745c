use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use integration_link::{
    Config, Server,
    cache::MemoryCache,
    integrations::{FlowState, config::ProviderConfig},
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;
use wiremock::MockServer;

pub const TOKEN_PATH: &str = "/oauth/v1/token";
pub const CONTACTS_PATH: &str = "/crm/v3/objects/contacts";

/// App wired to an in-memory cache, with HubSpot's token and list endpoints
/// pointed at a wiremock server
pub struct TestHarness {
    #[allow(dead_code)]
    pub config: Config,
    pub app: Router,
    pub cache: MemoryCache,
    pub provider_mock: MockServer,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::build(|_| {}).await
    }

    /// Adjust the config before the server is built
    pub async fn build(customize: impl FnOnce(&mut Config)) -> Self {
        let provider_mock = MockServer::start().await;

        let mut config = Config::default();
        config.metrics.enabled = false;
        config.logging.log_request = false;
        config.base_url = "http://localhost:8000".to_string();
        config.providers = HashMap::from([(
            "hubspot".to_string(),
            ProviderConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                token_url: Some(format!("{}{}", provider_mock.uri(), TOKEN_PATH)),
                items_url: Some(format!("{}{}", provider_mock.uri(), CONTACTS_PATH)),
                ..Default::default()
            },
        )]);
        customize(&mut config);

        let cache = MemoryCache::new();
        let server = Server::with_cache(config.clone(), Arc::new(cache.clone()))
            .await
            .unwrap();
        let app = server.create_app();

        Self {
            config,
            app,
            cache,
            provider_mock,
        }
    }

    pub async fn make_request(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_form(&self, uri: &str, fields: &[(&str, &str)]) -> Response {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.make_request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.make_request(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// POST /authorize and return the consent URL
    pub async fn authorize(&self, user_id: &str, org_id: &str) -> String {
        let response = self
            .post_form(
                "/integrations/hubspot/authorize",
                &[("user_id", user_id), ("org_id", org_id)],
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        body.as_str().unwrap().to_string()
    }

    /// GET /oauth2callback as the provider's redirect would
    pub async fn callback(&self, code: &str, state: &str) -> Response {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("code", code)
            .append_pair("state", state)
            .finish();
        self.get(&format!("/integrations/hubspot/oauth2callback?{}", query))
            .await
    }

    pub async fn take_credentials(&self, user_id: &str, org_id: &str) -> Response {
        self.post_form(
            "/integrations/hubspot/credentials",
            &[("user_id", user_id), ("org_id", org_id)],
        )
        .await
    }

    pub async fn load(&self, credentials: &Value) -> Response {
        let credentials = credentials.to_string();
        self.post_form("/integrations/hubspot/load", &[("credentials", &credentials)])
            .await
    }
}

pub fn query_param(url: &str, name: &str) -> Option<String> {
    Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Flip one character of the inner CSRF token, keeping the blob well-formed
#[allow(dead_code)]
pub fn tamper_state(encoded: &str) -> String {
    let mut state = FlowState::decode(encoded).unwrap();
    let mut chars: Vec<char> = state.state.chars().collect();
    let last = chars.len() - 1;
    chars[last] = if chars[last] == 'x' { 'y' } else { 'x' };
    state.state = chars.into_iter().collect();
    state.encode().unwrap()
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub async fn text_body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
