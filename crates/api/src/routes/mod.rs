pub mod common;
pub mod completions;
pub mod health;
pub mod models;

use services::InferenceRouter;
use std::sync::Arc;

/// Shared state for the gateway handlers
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<dyn InferenceRouter>,
}

impl AppState {
    pub fn new(router: Arc<dyn InferenceRouter>) -> Self {
        Self { router }
    }
}

pub use completions::chat_completions;
pub use health::health_check;
pub use models::{list_models, list_providers};
