pub mod compatible;
pub mod traits;

pub use compatible::OpenAiCompatibleProvider;
pub use traits::{ChatMessage, Provider, ProviderError};

use crate::config::AiConfig;
use anyhow::Result;
use std::sync::Arc;

/// Build the configured AI backend.
pub fn create_provider(cfg: &AiConfig) -> Result<Arc<dyn Provider>> {
    if cfg.api_key.as_deref().map(str::trim).unwrap_or("").is_empty() {
        tracing::warn!("ai.api_key is not set; requests will be sent without authorization");
    }
    Ok(Arc::new(OpenAiCompatibleProvider::from_config(cfg)?))
}
