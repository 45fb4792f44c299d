use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One archived message/reply exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// The inbound text exactly as received, including any command prefix.
    pub raw_content: Option<String>,
    /// WeChat `MsgType` (`text`, `image`, ...).
    pub message_kind: String,
    pub ai_reply: String,
    pub occurred_at: DateTime<Utc>,
    pub is_command: bool,
    pub command: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("message store is not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Notion API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { code, .. } if code == "object_not_found")
    }
}

/// Durable sink for message records.
#[async_trait]
pub trait MessageStore: Send + Sync {
    fn name(&self) -> &str;

    /// Persist one record; returns the identifier the store assigned.
    async fn save(&self, record: &MessageRecord) -> Result<String, StoreError>;
}
