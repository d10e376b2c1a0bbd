use async_trait::async_trait;
use inference_providers::ProviderId;

#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;

/// Upstream API key resolved for one call
///
/// The value is only reachable through [`ProviderCredential::expose`] and
/// never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredential(String);

impl ProviderCredential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Credential for upstreams that accept unauthenticated calls
    pub fn none() -> Self {
        Self(String::new())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProviderCredential(<redacted>)")
    }
}

/// Where a credential was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    ApiKey,
    Organization,
    Process,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::ApiKey => "api_key",
            CredentialSource::Organization => "organization",
            CredentialSource::Process => "process",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CredentialError {
    #[error("No credential configured for provider {0}")]
    NotFound(ProviderId),
    #[error("Credential lookup failed: {0}")]
    Backend(String),
}

/// Per-organization default upstream keys
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait OrganizationCredentials: Send + Sync {
    async fn default_key(
        &self,
        organization_id: &str,
        provider: ProviderId,
    ) -> Result<Option<String>, CredentialError>;
}
