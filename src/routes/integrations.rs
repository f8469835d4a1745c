use crate::{
    error::AppError,
    integrations::{
        CallbackQuery, Credentials, IntegrationService, NormalizedItem, provider::ProviderInfo,
    },
};
use axum::{
    Form, Router,
    extract::{FromRef, Path, Query, State},
    response::{Html, Json},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Closes the provider consent popup once tokens are stored
const CLOSE_WINDOW_HTML: &str = "<html>\n    <script>\n        window.close();\n    </script>\n</html>\n";

#[derive(Debug, Deserialize)]
pub struct LinkForm {
    pub user_id: String,
    pub org_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LoadForm {
    /// Credentials JSON as previously returned by `/credentials`
    pub credentials: String,
}

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderInfo>,
}

pub fn create_integration_routes<S>() -> Router<S>
where
    Arc<IntegrationService>: FromRef<S>,
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(list_providers))
        .route("/{provider}/authorize", post(authorize))
        .route("/{provider}/oauth2callback", get(oauth2callback))
        .route("/{provider}/credentials", post(credentials))
        .route("/{provider}/load", post(load_items))
}

async fn list_providers(
    State(service): State<Arc<IntegrationService>>,
) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: service.providers(),
    })
}

async fn authorize(
    State(service): State<Arc<IntegrationService>>,
    Path(provider): Path<String>,
    Form(form): Form<LinkForm>,
) -> Result<Json<String>, AppError> {
    let url = service
        .authorize(&provider, &form.user_id, &form.org_id)
        .await?;
    Ok(Json(url))
}

async fn oauth2callback(
    State(service): State<Arc<IntegrationService>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Html<&'static str>, AppError> {
    service.callback(&provider, &query).await?;
    Ok(Html(CLOSE_WINDOW_HTML))
}

async fn credentials(
    State(service): State<Arc<IntegrationService>>,
    Path(provider): Path<String>,
    Form(form): Form<LinkForm>,
) -> Result<Json<Value>, AppError> {
    let credentials = service
        .take_credentials(&provider, &form.user_id, &form.org_id)
        .await?;
    Ok(Json(credentials.into_value()))
}

async fn load_items(
    State(service): State<Arc<IntegrationService>>,
    Path(provider): Path<String>,
    Form(form): Form<LoadForm>,
) -> Result<Json<Vec<NormalizedItem>>, AppError> {
    let credentials = Credentials::parse(&form.credentials)?;
    let items = service.load_items(&provider, &credentials).await?;
    Ok(Json(items))
}
