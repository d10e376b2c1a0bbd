pub mod ports;

use async_trait::async_trait;
use config::OrganizationConfig;
use inference_providers::ProviderId;
use std::{collections::HashMap, sync::Arc};

use crate::auth::{parse_provider_keys, AuthError, Caller};
pub use ports::{CredentialError, CredentialSource, OrganizationCredentials, ProviderCredential};

/// Organization defaults loaded from the gateway config file
#[derive(Default)]
pub struct ConfigOrganizationCredentials {
    organizations: HashMap<String, HashMap<ProviderId, String>>,
}

impl ConfigOrganizationCredentials {
    pub fn from_config(
        organizations: &HashMap<String, OrganizationConfig>,
    ) -> Result<Self, AuthError> {
        let organizations = organizations
            .iter()
            .map(|(id, org)| Ok((id.clone(), parse_provider_keys(&org.provider_keys)?)))
            .collect::<Result<_, AuthError>>()?;
        Ok(Self { organizations })
    }
}

#[async_trait]
impl OrganizationCredentials for ConfigOrganizationCredentials {
    async fn default_key(
        &self,
        organization_id: &str,
        provider: ProviderId,
    ) -> Result<Option<String>, CredentialError> {
        Ok(self
            .organizations
            .get(organization_id)
            .and_then(|keys| keys.get(&provider))
            .cloned())
    }
}

/// Picks the upstream key for `(caller, provider)`
///
/// Lookup order: the caller's API-key record, then the caller's
/// organization, then the process-level default.
pub struct CredentialResolver {
    organizations: Arc<dyn OrganizationCredentials>,
    process_defaults: HashMap<ProviderId, String>,
}

impl CredentialResolver {
    pub fn new(
        organizations: Arc<dyn OrganizationCredentials>,
        process_defaults: HashMap<ProviderId, String>,
    ) -> Self {
        let process_defaults = process_defaults
            .into_iter()
            .filter(|(_, key)| !key.is_empty())
            .collect();
        Self {
            organizations,
            process_defaults,
        }
    }

    pub async fn resolve(
        &self,
        caller: &Caller,
        provider: ProviderId,
    ) -> Result<ProviderCredential, CredentialError> {
        let (credential, source) = self.lookup(caller, provider).await?;
        tracing::debug!(
            caller_id = %caller.caller_id,
            provider = %provider,
            source = source.as_str(),
            "Resolved provider credential"
        );
        Ok(credential)
    }

    async fn lookup(
        &self,
        caller: &Caller,
        provider: ProviderId,
    ) -> Result<(ProviderCredential, CredentialSource), CredentialError> {
        if let Some(key) = caller.provider_keys.get(&provider).filter(|k| !k.is_empty()) {
            return Ok((ProviderCredential::new(key.clone()), CredentialSource::ApiKey));
        }

        if let Some(organization_id) = &caller.organization_id {
            if let Some(key) = self
                .organizations
                .default_key(organization_id, provider)
                .await?
                .filter(|k| !k.is_empty())
            {
                return Ok((ProviderCredential::new(key), CredentialSource::Organization));
            }
        }

        self.process_default(provider)
            .map(|credential| (credential, CredentialSource::Process))
            .ok_or(CredentialError::NotFound(provider))
    }

    /// Process-level key, also used for model listing
    pub fn process_default(&self, provider: ProviderId) -> Option<ProviderCredential> {
        self.process_defaults
            .get(&provider)
            .map(|key| ProviderCredential::new(key.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ports::MockOrganizationCredentials;

    fn resolver_with(
        org_keys: &[(&str, ProviderId, &str)],
        process: &[(ProviderId, &str)],
    ) -> CredentialResolver {
        let mut organizations: HashMap<String, HashMap<ProviderId, String>> = HashMap::new();
        for (org, provider, key) in org_keys {
            organizations
                .entry(org.to_string())
                .or_default()
                .insert(*provider, key.to_string());
        }
        CredentialResolver::new(
            Arc::new(ConfigOrganizationCredentials { organizations }),
            process
                .iter()
                .map(|(p, k)| (*p, k.to_string()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_resolution_order() {
        let resolver = resolver_with(
            &[("org-1", ProviderId::OpenRouter, "org-key")],
            &[(ProviderId::OpenRouter, "process-key")],
        );

        let with_override = Caller::new("a")
            .with_organization("org-1")
            .with_provider_key(ProviderId::OpenRouter, "caller-key");
        let with_org = Caller::new("b").with_organization("org-1");
        let bare = Caller::new("c");

        let key = |c: ProviderCredential| c.expose().to_string();
        assert_eq!(
            key(resolver.resolve(&with_override, ProviderId::OpenRouter).await.unwrap()),
            "caller-key"
        );
        assert_eq!(
            key(resolver.resolve(&with_org, ProviderId::OpenRouter).await.unwrap()),
            "org-key"
        );
        assert_eq!(
            key(resolver.resolve(&bare, ProviderId::OpenRouter).await.unwrap()),
            "process-key"
        );
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let resolver = resolver_with(&[], &[(ProviderId::OpenRouter, "process-key")]);

        let err = resolver
            .resolve(&Caller::new("a"), ProviderId::Gemini)
            .await
            .unwrap_err();

        assert_eq!(err, CredentialError::NotFound(ProviderId::Gemini));
    }

    #[tokio::test]
    async fn test_empty_keys_are_ignored() {
        let resolver = resolver_with(&[], &[(ProviderId::Gemini, "")]);
        let caller = Caller::new("a").with_provider_key(ProviderId::Gemini, "");

        assert!(resolver.resolve(&caller, ProviderId::Gemini).await.is_err());
        assert!(resolver.process_default(ProviderId::Gemini).is_none());
    }

    #[tokio::test]
    async fn test_organization_backend_error_propagates() {
        let mut organizations = MockOrganizationCredentials::new();
        organizations
            .expect_default_key()
            .returning(|_, _| Err(CredentialError::Backend("unavailable".to_string())));
        let resolver = CredentialResolver::new(Arc::new(organizations), HashMap::new());
        let caller = Caller::new("a").with_organization("org-1");

        assert!(matches!(
            resolver.resolve(&caller, ProviderId::Gemini).await,
            Err(CredentialError::Backend(_))
        ));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = ProviderCredential::new("top-secret");
        assert!(!format!("{credential:?}").contains("top-secret"));
    }
}
