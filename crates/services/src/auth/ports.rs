use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inference_providers::ProviderId;
use std::collections::HashMap;

#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;

/// Authenticated identity behind a gateway API key
#[derive(Clone, PartialEq)]
pub struct Caller {
    pub caller_id: String,
    pub organization_id: Option<String>,
    /// Upstream keys stored on the caller's API-key record
    pub provider_keys: HashMap<ProviderId, String>,
}

impl Caller {
    pub fn new(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            organization_id: None,
            provider_keys: HashMap::new(),
        }
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_provider_key(mut self, provider: ProviderId, key: impl Into<String>) -> Self {
        self.provider_keys.insert(provider, key.into());
        self
    }
}

impl std::fmt::Debug for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<_> = self.provider_keys.keys().collect();
        providers.sort();
        f.debug_struct("Caller")
            .field("caller_id", &self.caller_id)
            .field("organization_id", &self.organization_id)
            .field("provider_keys", &providers)
            .finish()
    }
}

/// Stored API-key record, looked up by key hash
#[derive(Clone)]
pub struct ApiKeyRecord {
    pub caller_id: String,
    pub organization_id: Option<String>,
    pub enabled: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub provider_keys: HashMap<ProviderId, String>,
}

impl ApiKeyRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl std::fmt::Debug for ApiKeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<_> = self.provider_keys.keys().collect();
        providers.sort();
        f.debug_struct("ApiKeyRecord")
            .field("caller_id", &self.caller_id)
            .field("organization_id", &self.organization_id)
            .field("enabled", &self.enabled)
            .field("expires_at", &self.expires_at)
            .field("provider_keys", &providers)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing API key")]
    MissingKey,
    #[error("Invalid API key format")]
    MalformedKey,
    #[error("Invalid API key")]
    UnknownKey,
    #[error("API key is disabled")]
    Disabled,
    #[error("API key has expired")]
    Expired,
    #[error("Invalid API key record: {0}")]
    InvalidRecord(String),
    #[error("API key lookup failed: {0}")]
    Backend(String),
}

/// External API-key validator, keyed by `hex(HMAC-SHA256(secret, key))`
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait ApiKeyValidator: Send + Sync {
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, AuthError>;
}
