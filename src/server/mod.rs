pub mod config;
pub mod middleware;

use crate::{
    cache::{self, CacheHealthChecker, KeyValueCache},
    config::Config,
    error::AppError,
    health::HealthService,
    integrations::{IntegrationService, ProviderRegistry},
    metrics,
    routes::{create_health_routes, create_integration_routes},
    server::middleware::{request_id_middleware, request_response_logger},
    shutdown::wait_for_shutdown_signal,
};
use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    middleware as axum_middleware,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Form bodies here are a few hundred bytes; credentials JSON is the largest
const MAX_BODY_SIZE: usize = 64 * 1024;

#[derive(Clone)]
pub struct Server {
    pub config: Arc<Config>,
    pub cache: Arc<dyn KeyValueCache>,
    pub providers: Arc<ProviderRegistry>,
    pub integration_service: Arc<IntegrationService>,
    pub health_service: Arc<HealthService>,
}

impl FromRef<Server> for Arc<IntegrationService> {
    fn from_ref(server: &Server) -> Self {
        server.integration_service.clone()
    }
}

impl FromRef<Server> for Arc<HealthService> {
    fn from_ref(server: &Server) -> Self {
        server.health_service.clone()
    }
}

impl Server {
    pub async fn new(config: Config) -> Result<Self, AppError> {
        if config.metrics.enabled {
            if let Err(e) = metrics::init_metrics_with_port(config.metrics.port) {
                error!(
                    "Failed to start metrics server on port {}: {}",
                    config.metrics.port, e
                );
                return Err(AppError::Internal(format!(
                    "Failed to start metrics server: {}",
                    e
                )));
            }
        }

        let cache = cache::create_cache(&config.cache).await?;
        Self::with_cache(config, cache).await
    }

    /// Build around an existing cache backend
    pub async fn with_cache(config: Config, cache: Arc<dyn KeyValueCache>) -> Result<Self, AppError> {
        config.validate()?;

        let providers = Arc::new(ProviderRegistry::from_config(
            &config.providers,
            &config.base_url,
        )?);
        for provider in providers.iter() {
            info!(
                provider = %provider.name,
                redirect_uri = %provider.redirect_uri,
                pkce = provider.use_pkce,
                "Integration provider registered"
            );
        }

        let integration_service = Arc::new(IntegrationService::new(
            providers.clone(),
            cache.clone(),
            &config.flow,
        )?);

        let health_service = Arc::new(HealthService::new());
        health_service
            .register(Arc::new(CacheHealthChecker::new(cache.clone())))
            .await;
        health_service
            .register(integration_service.health_checker())
            .await;

        Ok(Self {
            config: Arc::new(config),
            cache,
            providers,
            integration_service,
            health_service,
        })
    }

    pub async fn run(&self) -> Result<(), AppError> {
        let app = self.create_app();

        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid listen address: {}", e)))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to bind to address: {}", e)))?;

        info!("Server listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                wait_for_shutdown_signal().await;
                info!("Graceful shutdown initiated");
            })
            .await
            .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

        info!("Server shutdown complete");
        Ok(())
    }

    pub fn create_app(&self) -> Router {
        let app = Router::new()
            .nest("/health", create_health_routes())
            .nest("/integrations", create_integration_routes())
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
            .with_state(self.clone());

        self.add_conditional_middleware(app)
            .layer(axum_middleware::from_fn(request_id_middleware))
    }

    fn add_conditional_middleware(&self, mut app: Router) -> Router {
        if self.config.metrics.enabled {
            app = app.layer(axum_middleware::from_fn(metrics::metrics_middleware));
        }
        if self.config.logging.log_request {
            app = app.layer(axum_middleware::from_fn(request_response_logger));
        }
        app
    }
}
