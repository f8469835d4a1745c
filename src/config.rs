use crate::cache::config::CacheConfig;
use crate::integrations::config::{FlowConfig, ProviderConfig};
use crate::server::config::{LoggingConfig, MetricsConfig, ServerConfig};
use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const ENV_PREFIX: &str = "INTEGRATIONS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    /// Public origin of this service, used to build OAuth redirect URIs
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            base_url: default_base_url(),
            logging: LoggingConfig::default(),
            cache: CacheConfig::default(),
            flow: FlowConfig::default(),
            metrics: MetricsConfig::default(),
            // Present so that credentials can be supplied purely through env
            providers: HashMap::from([("hubspot".to_string(), ProviderConfig::default())]),
        }
    }
}

impl Config {
    /// Defaults, then `config.yaml` in the working directory if present, then env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("config.yaml")
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if path.as_ref().exists() {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Message("base_url must not be empty".to_string()));
        }
        if self.flow.state_ttl_secs == 0 || self.flow.credentials_ttl_secs == 0 {
            return Err(ConfigError::Message(
                "flow TTLs must be greater than zero".to_string(),
            ));
        }
        match self.cache.backend.as_str() {
            "memory" | "redis" => Ok(()),
            other => Err(ConfigError::Message(format!(
                "Unsupported cache backend: {}",
                other
            ))),
        }
    }

    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}
