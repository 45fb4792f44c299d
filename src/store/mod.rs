pub mod notion;
pub mod traits;

pub use notion::{format_page_id, IntegrationInfo, MessageStatistics, NotionStore, StoredMessage};
pub use traits::{MessageRecord, MessageStore, StoreError};

use crate::config::NotionConfig;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Accepts and discards records; used when archiving is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

#[async_trait]
impl MessageStore for NoopStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn save(&self, record: &MessageRecord) -> Result<String, StoreError> {
        tracing::debug!(kind = %record.message_kind, "archiving disabled; record dropped");
        Ok(String::new())
    }
}

/// Notion when a token is configured, otherwise [`NoopStore`]. The Notion
/// connection is checked once here; a failed check is logged and saves
/// retry it later.
pub async fn create_store(cfg: &NotionConfig) -> Result<Arc<dyn MessageStore>> {
    if !cfg.is_enabled() {
        return Ok(Arc::new(NoopStore));
    }

    let notion = NotionStore::from_config(cfg)?;
    match notion.validate_connection(cfg.auto_create_database).await {
        Ok(id) => tracing::info!(database_id = %id, "Notion archive ready"),
        Err(e) => tracing::warn!(error = %e, "Notion archive unavailable at startup"),
    }
    Ok(Arc::new(notion))
}
