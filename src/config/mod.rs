pub mod schema;

pub use schema::{
    AiConfig, Config, GatewayConfig, LoggingConfig, NotionConfig, OfficialConfig,
    DEFAULT_NOTION_API_BASE,
};
