use super::{EntryKind, IntegrationError, IntegrationResult, cache_key, pkce::PkcePair};
use crate::cache::KeyValueCache;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

/// Size of the random CSRF token before encoding
const STATE_TOKEN_BYTES: usize = 32;

/// Anti-CSRF payload round-tripped through the provider's `state` parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowState {
    pub state: String,
    pub user_id: String,
    pub org_id: String,
}

impl FlowState {
    fn new(user_id: &str, org_id: &str) -> Self {
        let mut bytes = [0u8; STATE_TOKEN_BYTES];
        rand::rng().fill(&mut bytes[..]);
        Self {
            state: URL_SAFE_NO_PAD.encode(bytes),
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
        }
    }

    /// base64url(JSON), as placed in the authorization URL
    pub fn encode(&self) -> IntegrationResult<String> {
        let json = serde_json::to_vec(self).map_err(|_| IntegrationError::MalformedState)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Accepts padded or unpadded base64url
    pub fn decode(encoded: &str) -> IntegrationResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|_| IntegrationError::MalformedState)?;
        serde_json::from_slice(&bytes).map_err(|_| IntegrationError::MalformedState)
    }
}

/// Output of [`StateManager::begin_flow`]
#[derive(Debug, Clone)]
pub struct FlowStart {
    pub encoded_state: String,
    pub code_challenge: String,
}

/// A state check that passed, with the verifier cached alongside it
#[derive(Debug, Clone)]
pub struct ValidatedFlow {
    pub state: FlowState,
    pub code_verifier: Option<String>,
}

/// Issues and checks per-(org, user) CSRF state and PKCE verifiers
#[derive(Clone)]
pub struct StateManager {
    cache: Arc<dyn KeyValueCache>,
    provider: String,
    ttl: Duration,
}

impl StateManager {
    pub fn new(cache: Arc<dyn KeyValueCache>, provider: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cache,
            provider: provider.into(),
            ttl,
        }
    }

    fn key(&self, kind: EntryKind, user_id: &str, org_id: &str) -> String {
        cache_key(&self.provider, kind, org_id, user_id)
    }

    /// Generate and cache a fresh state token and PKCE verifier.
    ///
    /// A newer flow for the same user and org overwrites an older pending one.
    pub async fn begin_flow(&self, user_id: &str, org_id: &str) -> IntegrationResult<FlowStart> {
        let flow_state = FlowState::new(user_id, org_id);
        let pkce = PkcePair::generate();

        let state_json = serde_json::to_string(&flow_state)
            .map_err(|_| IntegrationError::MalformedState)?;
        let state_key = self.key(EntryKind::State, user_id, org_id);
        let verifier_key = self.key(EntryKind::Verifier, user_id, org_id);

        let (state_written, verifier_written) = tokio::join!(
            self.cache.set(&state_key, &state_json, self.ttl),
            self.cache.set(&verifier_key, &pkce.verifier, self.ttl),
        );
        state_written?;
        verifier_written?;

        Ok(FlowStart {
            encoded_state: flow_state.encode()?,
            code_challenge: pkce.challenge,
        })
    }

    /// Check `encoded_state` against the cached token for this user and org.
    ///
    /// On any failure the pending state and verifier are purged, so a bad
    /// callback can never be retried against the same entries.
    pub async fn validate(
        &self,
        encoded_state: &str,
        user_id: &str,
        org_id: &str,
    ) -> IntegrationResult<ValidatedFlow> {
        let result = self.check(encoded_state, user_id, org_id).await;
        if result.is_err() {
            if let Err(e) = self.consume(user_id, org_id).await {
                tracing::warn!(
                    provider = %self.provider,
                    org_id,
                    user_id,
                    "Failed to purge rejected flow state: {}",
                    e
                );
            }
        }
        result
    }

    async fn check(
        &self,
        encoded_state: &str,
        user_id: &str,
        org_id: &str,
    ) -> IntegrationResult<ValidatedFlow> {
        let received = FlowState::decode(encoded_state)?;

        let state_key = self.key(EntryKind::State, user_id, org_id);
        let verifier_key = self.key(EntryKind::Verifier, user_id, org_id);
        let (cached_state, cached_verifier) = tokio::join!(
            self.cache.get(&state_key),
            self.cache.get(&verifier_key),
        );

        let cached_state = cached_state?.ok_or(IntegrationError::StateNotFound)?;
        let cached_state: FlowState =
            serde_json::from_str(&cached_state).map_err(|_| IntegrationError::MalformedState)?;

        if received.state != cached_state.state
            || cached_state.user_id != user_id
            || cached_state.org_id != org_id
        {
            return Err(IntegrationError::StateMismatch);
        }

        Ok(ValidatedFlow {
            state: cached_state,
            code_verifier: cached_verifier?,
        })
    }

    /// Delete the state and verifier entries. Both deletes always run.
    pub async fn consume(&self, user_id: &str, org_id: &str) -> IntegrationResult<()> {
        let state_key = self.key(EntryKind::State, user_id, org_id);
        let verifier_key = self.key(EntryKind::Verifier, user_id, org_id);

        let (state_deleted, verifier_deleted) = tokio::join!(
            self.cache.delete(&state_key),
            self.cache.delete(&verifier_key),
        );
        state_deleted?;
        verifier_deleted?;
        Ok(())
    }

    pub async fn validate_and_consume(
        &self,
        encoded_state: &str,
        user_id: &str,
        org_id: &str,
    ) -> IntegrationResult<FlowState> {
        let validated = self.validate(encoded_state, user_id, org_id).await?;
        self.consume(user_id, org_id).await?;
        Ok(validated.state)
    }
}
