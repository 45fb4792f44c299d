//! Message orchestration: parse, decide, ask the AI backend, hand the
//! exchange to the store and build the reply envelope.
//!
//! Collaborators are injected so tests can substitute doubles. Persistence
//! runs on its own task and never delays or fails the reply.

use crate::commands::{decide, parse, CommandRegistry};
use crate::providers::{ChatMessage, Provider};
use crate::store::{MessageRecord, MessageStore};
use crate::wechat::format_text_reply;
use chrono::Utc;
use std::fmt::Display;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reply for message kinds the relay does not handle (images, voice, ...).
pub const UNSUPPORTED_KIND_TEXT: &str = "暂不支持该类型的消息，请发送文字内容";

/// User-visible text when the AI backend fails.
pub fn degraded_reply(err: impl Display) -> String {
    format!("服务器开小差了:{err}")
}

/// Outcome of one inbound message.
#[derive(Debug)]
pub struct ProcessedMessage {
    pub reply_text: String,
    /// Reply recipient (the original sender).
    pub to_user: String,
    /// Reply sender (the original recipient).
    pub from_user: String,
    pub create_time: i64,
    /// Background archive task, present only when the exchange is persisted.
    /// Dropping the handle detaches the task.
    pub persistence: Option<JoinHandle<()>>,
}

impl ProcessedMessage {
    pub fn is_persisted(&self) -> bool {
        self.persistence.is_some()
    }

    pub fn to_xml(&self) -> String {
        format_text_reply(&self.to_user, &self.from_user, &self.reply_text, self.create_time)
    }
}

#[derive(Clone)]
pub struct MessageProcessor {
    registry: Arc<CommandRegistry>,
    provider: Arc<dyn Provider>,
    store: Arc<dyn MessageStore>,
}

impl MessageProcessor {
    pub fn new(
        registry: Arc<CommandRegistry>,
        provider: Arc<dyn Provider>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            registry,
            provider,
            store,
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Handle one text message. Never fails: AI errors become a degraded
    /// reply and store errors are only logged.
    pub async fn process(
        &self,
        raw_text: Option<&str>,
        sender_id: &str,
        recipient_id: &str,
    ) -> ProcessedMessage {
        let parsed = parse(&self.registry, raw_text);
        let decision = decide(&parsed);
        debug!(
            sender = sender_id,
            command = parsed.matched_keyword().unwrap_or("-"),
            persist = decision.persist,
            "dispatching text message"
        );

        let reply_text = match decision.reply_override() {
            Some(text) => text.to_string(),
            None => {
                self.complete(decision.content_for_ai().unwrap_or_default())
                    .await
            }
        };

        let persistence = decision.persist.then(|| {
            self.submit_record(MessageRecord {
                raw_content: raw_text.map(str::to_string),
                message_kind: "text".into(),
                ai_reply: reply_text.clone(),
                occurred_at: Utc::now(),
                is_command: parsed.is_command(),
                command: parsed.matched_keyword().map(str::to_string),
            })
        });

        ProcessedMessage {
            reply_text,
            to_user: sender_id.to_string(),
            from_user: recipient_id.to_string(),
            create_time: Utc::now().timestamp(),
            persistence,
        }
    }

    /// Canned reply for a non-text message kind. Always persisted.
    pub fn process_unsupported(
        &self,
        message_kind: &str,
        sender_id: &str,
        recipient_id: &str,
    ) -> ProcessedMessage {
        let reply_text = UNSUPPORTED_KIND_TEXT.to_string();
        let persistence = self.submit_record(MessageRecord {
            raw_content: None,
            message_kind: message_kind.to_string(),
            ai_reply: reply_text.clone(),
            occurred_at: Utc::now(),
            is_command: false,
            command: None,
        });

        ProcessedMessage {
            reply_text,
            to_user: sender_id.to_string(),
            from_user: recipient_id.to_string(),
            create_time: Utc::now().timestamp(),
            persistence: Some(persistence),
        }
    }

    /// Single user turn to the AI backend; failures fold into the reply.
    pub async fn complete(&self, content: &str) -> String {
        match self.provider.chat(&[ChatMessage::user(content)]).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "AI completion failed");
                degraded_reply(e)
            }
        }
    }

    /// Archive `record` in the background. The outcome is only logged.
    pub fn submit_record(&self, record: MessageRecord) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            match store.save(&record).await {
                Ok(page_id) => info!(
                    store = store.name(),
                    page_id = %page_id,
                    kind = %record.message_kind,
                    "message archived"
                ),
                Err(e) => warn!(
                    store = store.name(),
                    kind = %record.message_kind,
                    error = %e,
                    "failed to archive message"
                ),
            }
        })
    }
}
