//! Key-value cache for short-lived flow state and credentials
//!
//! Values are plain strings (the integration layer always stores serialized
//! JSON). Every write carries an expiry; an expired entry is indistinguishable
//! from one that was never written.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod config;
pub mod memory;
pub mod redis;

pub use memory::MemoryCache;
pub use redis::RedisCache;

use crate::cache::config::CacheConfig;
use crate::health::{HealthCheckResult, HealthChecker};

/// Cache error types
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Unsupported cache backend: {0}")]
    UnsupportedBackend(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Minimal key-value protocol consumed by the integration layer.
///
/// Operations are atomic per key; there are no cross-key transactions.
#[async_trait::async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Backend name used in health reports and logs
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Backend connectivity probe
    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// Create the configured cache backend.
///
/// Redis is pinged once so that a misconfigured URL fails at startup rather
/// than on the first authorize request.
pub async fn create_cache(config: &CacheConfig) -> CacheResult<Arc<dyn KeyValueCache>> {
    match config.backend.as_str() {
        "memory" => {
            let cache = MemoryCache::new();
            cache.start_cleanup_task(Duration::from_secs(config.cleanup_interval_secs.max(1)));
            Ok(Arc::new(cache))
        }
        "redis" => {
            let cache = RedisCache::new(&config.redis_url, config.redis_key_prefix.clone())?;
            cache.ping().await?;
            tracing::info!(url = %config.redis_url, "Connected to Redis cache");
            Ok(Arc::new(cache))
        }
        other => Err(CacheError::UnsupportedBackend(other.to_string())),
    }
}

/// Health checker wrapping whichever backend is active
pub struct CacheHealthChecker {
    cache: Arc<dyn KeyValueCache>,
}

impl CacheHealthChecker {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }
}

#[async_trait::async_trait]
impl HealthChecker for CacheHealthChecker {
    fn name(&self) -> &str {
        "cache"
    }

    async fn check(&self) -> HealthCheckResult {
        let backend = self.cache.backend();
        match self.cache.ping().await {
            Ok(()) => HealthCheckResult::healthy_with_details(serde_json::json!({
                "backend": backend,
                "status": "healthy"
            })),
            Err(err) => HealthCheckResult::unhealthy_with_details(
                format!("{} cache health check failed", backend),
                serde_json::json!({
                    "backend": backend,
                    "status": "unhealthy",
                    "error": err.to_string()
                }),
            ),
        }
    }

    fn info(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "service": "Key-value cache",
            "backend": self.cache.backend()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;

    #[tokio::test]
    async fn test_create_memory_cache() {
        let config = CacheConfig::default();
        let cache = create_cache(&config).await.unwrap();
        assert_eq!(cache.backend(), "memory");

        cache
            .set("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_create_cache_unknown_backend() {
        let config = CacheConfig {
            backend: "memcached".to_string(),
            ..Default::default()
        };
        let result = create_cache(&config).await;
        assert!(matches!(result, Err(CacheError::UnsupportedBackend(name)) if name == "memcached"));
    }

    #[tokio::test]
    async fn test_memory_cache_health_is_healthy() {
        let checker = CacheHealthChecker::new(Arc::new(MemoryCache::new()));
        let result = checker.check().await;
        assert!(matches!(result.status, HealthStatus::Healthy));
        assert_eq!(checker.name(), "cache");
    }
}
