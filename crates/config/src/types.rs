use serde::Deserialize;
use std::{collections::HashMap, env};

pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_PROVIDER_PRIORITY: &str = "jan,openrouter,gemini";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub providers: ProvidersConfig,
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub gateway: GatewayFile,
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            providers: ProvidersConfig::from_env()?,
            registry: RegistryConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            gateway: GatewayFile::default(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| "SERVER_PORT must be a valid port number")?,
        })
    }
}

/// Connection settings for one upstream provider
#[derive(Clone, Default)]
pub struct ProviderEndpointConfig {
    pub base_url: String,
    /// Process-level default credential, used when neither the caller nor
    /// the organization carries one
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ProviderEndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEndpointConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    /// Jan inference is only enabled when `JAN_INFERENCE_MODEL_URL` is set
    pub jan: Option<ProviderEndpointConfig>,
    pub openrouter: ProviderEndpointConfig,
    pub gemini: ProviderEndpointConfig,
    pub timeouts: InferenceTimeoutConfig,
}

impl ProvidersConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        let jan = env::var("JAN_INFERENCE_MODEL_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|base_url| ProviderEndpointConfig {
                base_url: trim_base_url(&base_url),
                api_key: non_empty_var("JAN_INFERENCE_API_KEY"),
            });

        Ok(Self {
            jan,
            openrouter: ProviderEndpointConfig {
                base_url: trim_base_url(
                    &non_empty_var("OPENROUTER_BASE_URL")
                        .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string()),
                ),
                api_key: non_empty_var("OPENROUTER_API_KEY"),
            },
            gemini: ProviderEndpointConfig {
                base_url: trim_base_url(
                    &non_empty_var("GEMINI_BASE_URL")
                        .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                ),
                api_key: non_empty_var("GEMINI_API_KEY"),
            },
            timeouts: InferenceTimeoutConfig::from_env()?,
        })
    }
}

/// Upstream timeouts, all in seconds
#[derive(Debug, Clone)]
pub struct InferenceTimeoutConfig {
    pub request_timeout: u64,
    pub stream_header_timeout: u64,
    pub stream_idle_timeout: u64,
}

impl InferenceTimeoutConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            request_timeout: env::var("INFERENCE_REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| "INFERENCE_REQUEST_TIMEOUT must be a number of seconds")?,
            stream_header_timeout: env::var("INFERENCE_STREAM_HEADER_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| "INFERENCE_STREAM_HEADER_TIMEOUT must be a number of seconds")?,
            stream_idle_timeout: env::var("INFERENCE_STREAM_IDLE_TIMEOUT")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| "INFERENCE_STREAM_IDLE_TIMEOUT must be a number of seconds")?,
        })
    }
}

impl Default for InferenceTimeoutConfig {
    fn default() -> Self {
        Self {
            request_timeout: 30,
            stream_header_timeout: 30,
            stream_idle_timeout: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub refresh_interval: u64, // seconds
    pub provider_timeout: u64, // seconds
    /// Collision priority, highest first
    pub priority: Vec<String>,
}

impl RegistryConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        let priority = parse_priority(
            &env::var("MODEL_REGISTRY_PRIORITY")
                .unwrap_or_else(|_| DEFAULT_PROVIDER_PRIORITY.to_string()),
        );
        if priority.is_empty() {
            return Err("MODEL_REGISTRY_PRIORITY must name at least one provider".to_string());
        }

        Ok(Self {
            refresh_interval: env::var("MODEL_REGISTRY_REFRESH_INTERVAL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300), // 5 minutes
            provider_timeout: env::var("MODEL_REGISTRY_PROVIDER_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            priority,
        })
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            refresh_interval: 300,
            provider_timeout: 5,
            priority: parse_priority(DEFAULT_PROVIDER_PRIORITY),
        }
    }
}

/// Split a comma separated provider list, lowercasing and dropping blanks
pub fn parse_priority(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Logging Configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub modules: HashMap<String, String>,
}

impl LoggingConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        let mut modules = HashMap::new();

        // Load module-specific log levels
        if let Ok(level) = env::var("LOG_MODULE_API") {
            modules.insert("api".to_string(), level);
        }
        if let Ok(level) = env::var("LOG_MODULE_SERVICES") {
            modules.insert("services".to_string(), level);
        }
        if let Ok(level) = env::var("LOG_MODULE_PROVIDERS") {
            modules.insert("inference_providers".to_string(), level);
        }

        Ok(Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            modules,
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut modules = HashMap::new();
        modules.insert("api".to_string(), "debug".to_string());
        modules.insert("services".to_string(), "debug".to_string());

        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            modules,
        }
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret used to hash gateway API keys before lookup
    pub apikey_secret: String,
}

impl AuthConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            apikey_secret: non_empty_var("APIKEY_SECRET").ok_or("APIKEY_SECRET not set")?,
        })
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("apikey_secret", &"<redacted>")
            .finish()
    }
}

/// Contents of the optional YAML gateway file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayFile {
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
    #[serde(default)]
    pub organizations: HashMap<String, OrganizationConfig>,
    #[serde(default)]
    pub model_pins: Vec<ModelPinConfig>,
}

/// A gateway API key record, stored by its HMAC hash
#[derive(Clone, Deserialize)]
pub struct ApiKeyConfig {
    pub key_hash: String,
    pub caller_id: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    /// Per-caller upstream credential overrides, keyed by provider
    #[serde(default)]
    pub provider_keys: HashMap<String, String>,
}

impl std::fmt::Debug for ApiKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyConfig")
            .field("caller_id", &self.caller_id)
            .field("organization_id", &self.organization_id)
            .field("enabled", &self.enabled)
            .field("expires_at", &self.expires_at)
            .field("providers", &self.provider_keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Clone, Default, Deserialize)]
pub struct OrganizationConfig {
    #[serde(default)]
    pub provider_keys: HashMap<String, String>,
}

impl std::fmt::Debug for OrganizationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrganizationConfig")
            .field("providers", &self.provider_keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Binds a public model id to a fixed provider and upstream id
#[derive(Debug, Clone, Deserialize)]
pub struct ModelPinConfig {
    pub model: String,
    pub provider: String,
    pub upstream_id: String,
}

fn default_enabled() -> bool {
    true
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
