pub mod auth;
pub mod common;
pub mod completions;
pub mod credentials;
pub mod model_registry;

pub use auth::{AuthService, Caller};
pub use completions::{GatewayError, InferenceRouter, MultiProviderInference};
pub use credentials::CredentialResolver;
pub use model_registry::ModelRegistry;
