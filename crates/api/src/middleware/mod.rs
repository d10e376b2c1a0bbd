// API Middleware
//
// Bearer API key authentication for the gateway routes.

pub mod auth;

// Re-export commonly used items
pub use auth::{auth_middleware_with_api_key, AuthState};
