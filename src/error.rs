use crate::cache::CacheError;
use crate::integrations::IntegrationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(config::ConfigError),
    Integration(IntegrationError),
    BadRequest(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "Configuration error: {}", err),
            AppError::Integration(err) => write!(f, "{}", err),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<IntegrationError> for AppError {
    fn from(err: IntegrationError) -> Self {
        AppError::Integration(err)
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::Integration(IntegrationError::Cache(err))
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Integration(err) => match err {
                IntegrationError::Provider { status, .. } => status
                    .and_then(|s| StatusCode::from_u16(s).ok())
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::BAD_REQUEST),
                IntegrationError::MalformedState
                | IntegrationError::StateNotFound
                | IntegrationError::StateMismatch
                | IntegrationError::CredentialsNotFound
                | IntegrationError::MissingAccessToken
                | IntegrationError::MalformedCredentials(_) => StatusCode::BAD_REQUEST,
                IntegrationError::Transport(_) => StatusCode::BAD_GATEWAY,
                IntegrationError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
                IntegrationError::UnknownProvider(_) => StatusCode::NOT_FOUND,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "configuration_error",
            AppError::Integration(err) => err.code(),
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            // Backend details stay in the logs
            AppError::Config(_) | AppError::Internal(_) | AppError::Integration(IntegrationError::Cache(_)) => {
                tracing::error!("{}", self);
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "detail": detail
        }));

        (status, body).into_response()
    }
}
