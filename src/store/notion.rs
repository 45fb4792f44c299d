use super::traits::{MessageRecord, MessageStore, StoreError};
use crate::config::NotionConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

pub const NOTION_VERSION: &str = "2022-06-28";
const NOTION_TEXT_MAX_CHARS: usize = 2_000;
const NOTION_PAGE_SIZE_MAX: usize = 100;
const DATABASE_TITLE: &str = "公众号消息记录";

const PROP_CONTENT: &str = "消息内容";
const PROP_KIND: &str = "消息类型";
const PROP_REPLY: &str = "AI回复";
const PROP_IS_COMMAND: &str = "是否指令";
const PROP_COMMAND: &str = "指令类型";
const PROP_CREATED: &str = "创建时间";

const EMPTY_CONTENT_LABEL: &str = "空消息";
const EMPTY_REPLY_LABEL: &str = "无回复";
const PLAIN_MESSAGE_LABEL: &str = "普通消息";
const UNKNOWN_COMMAND_LABEL: &str = "/unknown";

/// Archives message records as pages of a Notion database.
pub struct NotionStore {
    api_base: String,
    token: String,
    parent_page_id: Option<String>,
    auto_create: bool,
    database: RwLock<DatabaseState>,
    /// Serialises verify-or-create so concurrent saves adopt one database.
    setup: tokio::sync::Mutex<()>,
    client: reqwest::Client,
}

#[derive(Debug, Default)]
struct DatabaseState {
    id: Option<String>,
    verified: bool,
}

/// A record read back from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredMessage {
    pub id: String,
    pub content: String,
    pub message_kind: String,
    pub timestamp: String,
    pub created_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageStatistics {
    pub total_messages: usize,
    pub message_kinds: BTreeMap<String, usize>,
    pub daily: BTreeMap<String, usize>,
}

/// The bot user behind the integration token.
#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationInfo {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Normalize a 32-hex page id (with or without dashes/spaces) into the dashed
/// UUID form Notion expects. Anything else is returned unchanged.
pub fn format_page_id(raw: &str) -> String {
    let clean: String = raw
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect();
    if clean.len() != 32 || !clean.chars().all(|c| c.is_ascii_hexdigit()) {
        return raw.to_string();
    }
    format!(
        "{}-{}-{}-{}-{}",
        &clean[..8],
        &clean[8..12],
        &clean[12..16],
        &clean[16..20],
        &clean[20..]
    )
}

fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}

fn rich_text(content: &str) -> Value {
    json!([{ "text": { "content": truncate_chars(content, NOTION_TEXT_MAX_CHARS) } }])
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

fn record_properties(record: &MessageRecord) -> Value {
    let content = record
        .raw_content
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(EMPTY_CONTENT_LABEL);
    let kind = if record.message_kind.is_empty() {
        "text"
    } else {
        record.message_kind.as_str()
    };
    let reply = if record.ai_reply.is_empty() {
        EMPTY_REPLY_LABEL
    } else {
        record.ai_reply.as_str()
    };
    let command = if record.is_command {
        record.command.as_deref().unwrap_or(UNKNOWN_COMMAND_LABEL)
    } else {
        PLAIN_MESSAGE_LABEL
    };

    json!({
        PROP_CONTENT: { "title": rich_text(content) },
        PROP_KIND: { "select": { "name": kind } },
        PROP_REPLY: { "rich_text": rich_text(reply) },
        PROP_IS_COMMAND: { "checkbox": record.is_command },
        PROP_COMMAND: { "select": { "name": command } },
        PROP_CREATED: {
            "date": { "start": record.occurred_at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string() }
        },
    })
}

fn database_schema(parent_page_id: &str) -> Value {
    let option = |name: &str, color: &str| json!({ "name": name, "color": color });
    json!({
        "parent": { "type": "page_id", "page_id": parent_page_id },
        "title": [{ "type": "text", "text": { "content": DATABASE_TITLE } }],
        "properties": {
            PROP_CONTENT: { "title": {} },
            PROP_KIND: { "select": { "options": [
                option("text", "blue"),
                option("image", "green"),
                option("video", "purple"),
                option("voice", "orange"),
                option("location", "red"),
                option("link", "yellow"),
                option("event", "gray"),
            ] } },
            PROP_REPLY: { "rich_text": {} },
            PROP_IS_COMMAND: { "checkbox": {} },
            PROP_COMMAND: { "select": { "options": [
                option("/ai", "purple"),
                option("/help", "blue"),
                option(PLAIN_MESSAGE_LABEL, "default"),
            ] } },
            PROP_CREATED: { "date": {} },
        },
    })
}

fn page_to_stored_message(page: &Value) -> StoredMessage {
    let props = page.get("properties");
    let prop = |name: &str| props.and_then(|p| p.get(name));
    let as_owned = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .unwrap_or_default()
    };

    StoredMessage {
        id: as_owned(page.get("id")),
        content: as_owned(
            prop(PROP_CONTENT)
                .and_then(|v| v.get("title"))
                .and_then(|v| v.get(0))
                .and_then(|v| v.get("text"))
                .and_then(|v| v.get("content")),
        ),
        message_kind: as_owned(
            prop(PROP_KIND)
                .and_then(|v| v.get("select"))
                .and_then(|v| v.get("name")),
        ),
        timestamp: as_owned(
            prop(PROP_CREATED)
                .and_then(|v| v.get("date"))
                .and_then(|v| v.get("start")),
        ),
        created_time: as_owned(page.get("created_time")),
    }
}

fn day_of(created_time: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(created_time)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| created_time.chars().take(10).collect())
}

impl NotionStore {
    pub fn from_config(cfg: &NotionConfig) -> Result<Self> {
        let token = non_blank(cfg.token.as_deref())
            .ok_or_else(|| anyhow::anyhow!("notion.token is not configured"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .context("failed to initialize Notion HTTP client")?;

        Ok(Self {
            api_base: cfg.api_base_url.trim().trim_end_matches('/').to_string(),
            token,
            parent_page_id: non_blank(cfg.parent_page_id.as_deref()).map(|id| format_page_id(&id)),
            auto_create: cfg.auto_create_database,
            database: RwLock::new(DatabaseState {
                id: non_blank(cfg.database_id.as_deref()),
                verified: false,
            }),
            setup: tokio::sync::Mutex::new(()),
            client,
        })
    }

    /// Currently adopted database id, including one created at runtime.
    pub fn database_id(&self) -> Option<String> {
        self.database.read().id.clone()
    }

    pub fn parent_page_id(&self) -> Option<&str> {
        self.parent_page_id.as_deref()
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, StoreError> {
        let url = format!("{}/{}", self.api_base, path.trim_start_matches('/'));
        let mut builder = self
            .client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION);
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let parsed: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            let field = |name: &str| {
                parsed
                    .get(name)
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned)
            };
            return Err(StoreError::Api {
                status: status.as_u16(),
                code: field("code").unwrap_or_else(|| "unknown".to_string()),
                message: field("message").unwrap_or_else(|| text.trim().to_string()),
            });
        }

        serde_json::from_str(&text).map_err(|err| StoreError::InvalidResponse(err.to_string()))
    }

    /// `GET users/me`: confirms the integration token works.
    pub async fn check_integration(&self) -> Result<IntegrationInfo, StoreError> {
        let value = self.request(Method::GET, "users/me", None).await?;
        serde_json::from_value(value).map_err(|err| StoreError::InvalidResponse(err.to_string()))
    }

    pub async fn retrieve_page(&self, page_id: &str) -> Result<Value, StoreError> {
        self.request(Method::GET, &format!("pages/{}", format_page_id(page_id)), None)
            .await
    }

    /// Create the message database under the configured parent page and
    /// adopt its id.
    pub async fn create_message_database(&self) -> Result<String, StoreError> {
        let parent = self
            .parent_page_id
            .as_deref()
            .ok_or(StoreError::NotConfigured("notion.parent_page_id"))?;

        tracing::info!(parent = %parent, "creating Notion message database");
        let created = self
            .request(Method::POST, "databases", Some(database_schema(parent)))
            .await?;
        let id = created
            .get("id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| StoreError::InvalidResponse("database response without id".into()))?;

        {
            let mut state = self.database.write();
            state.id = Some(id.clone());
            state.verified = true;
        }
        tracing::info!(
            database_id = %id,
            url = created.get("url").and_then(|v| v.as_str()).unwrap_or("-"),
            "Notion message database created; set NOTION_DATABASE_ID to reuse it"
        );
        Ok(id)
    }

    /// Make sure the database is reachable, creating it when allowed and
    /// missing. Returns the usable database id.
    pub async fn validate_connection(&self, auto_create: bool) -> Result<String, StoreError> {
        if let Some(id) = self.verified_database_id() {
            return Ok(id);
        }

        let _setup = self.setup.lock().await;
        // Another caller may have finished while we waited.
        if let Some(id) = self.verified_database_id() {
            return Ok(id);
        }
        let known = self.database.read().id.clone();

        let Some(id) = known else {
            if auto_create {
                tracing::warn!("Notion database id is not set; creating a new database");
                return self.create_message_database().await;
            }
            return Err(StoreError::NotConfigured("notion.database_id"));
        };

        match self
            .request(Method::GET, &format!("databases/{id}"), None)
            .await
        {
            Ok(_) => {
                self.database.write().verified = true;
                Ok(id)
            }
            Err(err) if err.is_not_found() && auto_create => {
                tracing::warn!(database_id = %id, "Notion database not found; creating a new one");
                self.create_message_database().await
            }
            Err(err) => Err(err),
        }
    }

    fn verified_database_id(&self) -> Option<String> {
        let state = self.database.read();
        if state.verified {
            state.id.clone()
        } else {
            None
        }
    }

    fn invalidate(&self) {
        self.database.write().verified = false;
    }

    /// Latest records, newest first.
    pub async fn query_messages(&self, limit: usize) -> Result<Vec<StoredMessage>, StoreError> {
        let id = self.validate_connection(self.auto_create).await?;
        let body = json!({
            "page_size": limit.clamp(1, NOTION_PAGE_SIZE_MAX),
            "sorts": [{ "property": PROP_CREATED, "direction": "descending" }],
        });
        let response = self
            .request(Method::POST, &format!("databases/{id}/query"), Some(body))
            .await?;

        Ok(response
            .get("results")
            .and_then(Value::as_array)
            .map(|pages| pages.iter().map(page_to_stored_message).collect())
            .unwrap_or_default())
    }

    /// Totals per message kind and per creation day across the whole database.
    pub async fn statistics(&self) -> Result<MessageStatistics, StoreError> {
        let id = self.validate_connection(self.auto_create).await?;
        let mut stats = MessageStatistics::default();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": NOTION_PAGE_SIZE_MAX });
            if let Some(next) = cursor.as_deref() {
                body["start_cursor"] = json!(next);
            }
            let response = self
                .request(Method::POST, &format!("databases/{id}/query"), Some(body))
                .await?;

            for page in response
                .get("results")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let msg = page_to_stored_message(page);
                let kind = if msg.message_kind.is_empty() {
                    "unknown".to_string()
                } else {
                    msg.message_kind
                };
                stats.total_messages += 1;
                *stats.message_kinds.entry(kind).or_default() += 1;
                *stats.daily.entry(day_of(&msg.created_time)).or_default() += 1;
            }

            let has_more = response
                .get("has_more")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            cursor = response
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned);
            if !has_more || cursor.is_none() {
                break;
            }
        }

        Ok(stats)
    }
}

#[async_trait]
impl MessageStore for NotionStore {
    fn name(&self) -> &str {
        "notion"
    }

    async fn save(&self, record: &MessageRecord) -> Result<String, StoreError> {
        let database_id = self.validate_connection(self.auto_create).await?;
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": record_properties(record),
        });

        let created = match self.request(Method::POST, "pages", Some(body)).await {
            Ok(value) => value,
            Err(err) => {
                if err.is_not_found() {
                    self.invalidate();
                }
                return Err(err);
            }
        };

        created
            .get("id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| StoreError::InvalidResponse("page response without id".into()))
    }
}
