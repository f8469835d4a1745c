use super::{EntryKind, IntegrationError, IntegrationResult, cache_key};
use crate::cache::KeyValueCache;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{sync::Arc, time::Duration};

/// Token response from a provider, kept verbatim.
///
/// Only `access_token` is interpreted; everything else is passed through to
/// the caller untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(Map<String, Value>);

impl Credentials {
    pub fn from_value(value: Value) -> IntegrationResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(IntegrationError::MalformedCredentials(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn parse(raw: &str) -> IntegrationResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| IntegrationError::MalformedCredentials(e.to_string()))?;
        Self::from_value(value)
    }

    /// The bearer token, if present and non-empty
    pub fn access_token(&self) -> Option<&str> {
        self.0
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Completed credentials waiting to be picked up, readable exactly once
#[derive(Clone)]
pub struct CredentialStore {
    cache: Arc<dyn KeyValueCache>,
    provider: String,
    ttl: Duration,
}

impl CredentialStore {
    pub fn new(cache: Arc<dyn KeyValueCache>, provider: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cache,
            provider: provider.into(),
            ttl,
        }
    }

    fn key(&self, user_id: &str, org_id: &str) -> String {
        cache_key(&self.provider, EntryKind::Credentials, org_id, user_id)
    }

    pub async fn put(
        &self,
        user_id: &str,
        org_id: &str,
        credentials: &Credentials,
    ) -> IntegrationResult<()> {
        let parked = ParkedCredentials {
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
            credentials: credentials.clone(),
        };
        let raw = serde_json::to_string(&parked)
            .map_err(|e| IntegrationError::MalformedCredentials(e.to_string()))?;
        self.cache
            .set(&self.key(user_id, org_id), &raw, self.ttl)
            .await?;
        Ok(())
    }

    /// Read and delete. Missing, expired, already-taken and owned by another
    /// pair are all the same error.
    pub async fn take(&self, user_id: &str, org_id: &str) -> IntegrationResult<Credentials> {
        let key = self.key(user_id, org_id);
        let raw = self
            .cache
            .get(&key)
            .await?
            .ok_or(IntegrationError::CredentialsNotFound)?;

        let parked = match serde_json::from_str::<ParkedCredentials>(&raw) {
            Ok(parked) => parked,
            Err(e) => {
                self.cache.delete(&key).await?;
                return Err(IntegrationError::MalformedCredentials(e.to_string()));
            }
        };
        if parked.user_id != user_id || parked.org_id != org_id {
            return Err(IntegrationError::CredentialsNotFound);
        }

        self.cache.delete(&key).await?;
        Ok(parked.credentials)
    }
}

/// Cached form of [`Credentials`], tagged with the pair that completed the flow
#[derive(Serialize, Deserialize)]
struct ParkedCredentials {
    user_id: String,
    org_id: String,
    credentials: Credentials,
}
