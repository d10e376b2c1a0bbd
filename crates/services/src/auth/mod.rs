pub mod ports;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use config::ApiKeyConfig;
use inference_providers::ProviderId;
use std::{collections::HashMap, sync::Arc};

use crate::common::{hash_api_key, is_valid_api_key_format, key_hash_prefix};
pub use ports::{ApiKeyRecord, ApiKeyValidator, AuthError, Caller};

/// API-key validator backed by the records of the gateway config file
pub struct ConfigApiKeyValidator {
    records: HashMap<String, ApiKeyRecord>,
}

impl ConfigApiKeyValidator {
    pub fn from_config(keys: &[ApiKeyConfig]) -> Result<Self, AuthError> {
        let mut records = HashMap::with_capacity(keys.len());
        for key in keys {
            let provider_keys = parse_provider_keys(&key.provider_keys)?;
            let expires_at = key
                .expires_at
                .map(|secs| {
                    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
                        AuthError::InvalidRecord(format!(
                            "expires_at {secs} of caller {} is out of range",
                            key.caller_id
                        ))
                    })
                })
                .transpose()?;

            let record = ApiKeyRecord {
                caller_id: key.caller_id.clone(),
                organization_id: key.organization_id.clone(),
                enabled: key.enabled,
                expires_at,
                provider_keys,
            };
            if records
                .insert(key.key_hash.to_ascii_lowercase(), record)
                .is_some()
            {
                return Err(AuthError::InvalidRecord(format!(
                    "duplicate key hash {}",
                    key_hash_prefix(&key.key_hash)
                )));
            }
        }
        Ok(Self { records })
    }
}

#[async_trait]
impl ApiKeyValidator for ConfigApiKeyValidator {
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, AuthError> {
        Ok(self.records.get(key_hash).cloned())
    }
}

/// Parse `{provider name: key}` maps from config into typed provider ids
pub fn parse_provider_keys(
    raw: &HashMap<String, String>,
) -> Result<HashMap<ProviderId, String>, AuthError> {
    raw.iter()
        .filter(|(_, key)| !key.trim().is_empty())
        .map(|(name, key)| {
            name.parse::<ProviderId>()
                .map(|provider| (provider, key.trim().to_string()))
                .map_err(AuthError::InvalidRecord)
        })
        .collect()
}

/// Turns a bearer token into a [`Caller`]
pub struct AuthService {
    validator: Arc<dyn ApiKeyValidator>,
    secret: String,
}

impl AuthService {
    pub fn new(validator: Arc<dyn ApiKeyValidator>, secret: impl Into<String>) -> Self {
        Self {
            validator,
            secret: secret.into(),
        }
    }

    pub async fn authenticate(&self, token: &str) -> Result<Caller, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingKey);
        }
        if !is_valid_api_key_format(token) {
            tracing::debug!("Rejected bearer token with invalid format");
            return Err(AuthError::MalformedKey);
        }

        let key_hash = hash_api_key(&self.secret, token);
        let record = self
            .validator
            .find_by_hash(&key_hash)
            .await?
            .ok_or_else(|| {
                tracing::debug!(key_hash = %key_hash_prefix(&key_hash), "Unknown API key");
                AuthError::UnknownKey
            })?;

        if !record.enabled {
            tracing::info!(
                key_hash = %key_hash_prefix(&key_hash),
                caller_id = %record.caller_id,
                "Rejected disabled API key"
            );
            return Err(AuthError::Disabled);
        }
        if record.is_expired(Utc::now()) {
            tracing::info!(
                key_hash = %key_hash_prefix(&key_hash),
                caller_id = %record.caller_id,
                "Rejected expired API key"
            );
            return Err(AuthError::Expired);
        }

        Ok(Caller {
            caller_id: record.caller_id,
            organization_id: record.organization_id,
            provider_keys: record.provider_keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn key_config(key: &str, caller: &str) -> ApiKeyConfig {
        ApiKeyConfig {
            key_hash: hash_api_key(SECRET, key),
            caller_id: caller.to_string(),
            organization_id: Some("org-1".to_string()),
            enabled: true,
            expires_at: None,
            provider_keys: HashMap::from([("openrouter".to_string(), "or-key".to_string())]),
        }
    }

    fn service(keys: &[ApiKeyConfig]) -> AuthService {
        let validator = ConfigApiKeyValidator::from_config(keys).unwrap();
        AuthService::new(Arc::new(validator), SECRET)
    }

    #[tokio::test]
    async fn test_authenticate_known_key() {
        let auth = service(&[key_config("sk-alice", "alice")]);

        let caller = auth.authenticate("sk-alice").await.unwrap();

        assert_eq!(caller.caller_id, "alice");
        assert_eq!(caller.organization_id.as_deref(), Some("org-1"));
        assert_eq!(
            caller.provider_keys.get(&ProviderId::OpenRouter).map(String::as_str),
            Some("or-key")
        );
    }

    #[tokio::test]
    async fn test_authenticate_rejects_unknown_and_malformed_keys() {
        let auth = service(&[key_config("sk-alice", "alice")]);

        assert_eq!(auth.authenticate("sk-bob").await, Err(AuthError::UnknownKey));
        assert_eq!(auth.authenticate("alice").await, Err(AuthError::MalformedKey));
        assert_eq!(auth.authenticate("  ").await, Err(AuthError::MissingKey));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_disabled_and_expired_keys() {
        let mut disabled = key_config("sk-disabled", "d");
        disabled.enabled = false;
        let mut expired = key_config("sk-expired", "e");
        expired.expires_at = Some(Utc::now().timestamp() - 60);
        let mut future = key_config("sk-future", "f");
        future.expires_at = Some(Utc::now().timestamp() + 3600);
        let auth = service(&[disabled, expired, future]);

        assert_eq!(auth.authenticate("sk-disabled").await, Err(AuthError::Disabled));
        assert_eq!(auth.authenticate("sk-expired").await, Err(AuthError::Expired));
        assert!(auth.authenticate("sk-future").await.is_ok());
    }

    #[tokio::test]
    async fn test_authenticate_looks_up_hmac_hash() {
        let expected = hash_api_key(SECRET, "sk-carol");
        let mut validator = ports::MockApiKeyValidator::new();
        validator
            .expect_find_by_hash()
            .withf(move |hash| hash == expected)
            .times(1)
            .returning(|_| Ok(None));
        let auth = AuthService::new(Arc::new(validator), SECRET);

        assert_eq!(auth.authenticate("sk-carol").await, Err(AuthError::UnknownKey));
    }

    #[test]
    fn test_from_config_rejects_unknown_provider() {
        let mut key = key_config("sk-alice", "alice");
        key.provider_keys
            .insert("anthropic".to_string(), "a-key".to_string());

        assert!(matches!(
            ConfigApiKeyValidator::from_config(&[key]),
            Err(AuthError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_from_config_rejects_duplicate_hashes() {
        let keys = [key_config("sk-alice", "alice"), key_config("sk-alice", "again")];
        assert!(matches!(
            ConfigApiKeyValidator::from_config(&keys),
            Err(AuthError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_caller_debug_hides_keys() {
        let caller = Caller::new("alice").with_provider_key(ProviderId::Gemini, "g-secret");
        let rendered = format!("{caller:?}");
        assert!(rendered.contains("Gemini"));
        assert!(!rendered.contains("g-secret"));
    }
}
