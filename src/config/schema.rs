use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com/v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path the config was loaded from, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
    /// Environment overrides that could not be applied. Reported through
    /// [`Config::warnings`] once logging is up.
    #[serde(skip)]
    pub rejected_overrides: Vec<String>,
    pub gateway: GatewayConfig,
    pub official: OfficialConfig,
    pub ai: AiConfig,
    pub notion: NotionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
            request_timeout_secs: 30,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// WeChat Official Account settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfficialConfig {
    /// Token configured in the Official Account console.
    pub token: Option<String>,
    /// Also check `signature` on message callbacks, not only on URL
    /// verification.
    pub verify_callbacks: bool,
}

impl Default for OfficialConfig {
    fn default() -> Self {
        Self {
            token: None,
            verify_callbacks: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub system_prompt: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: "gpt-4o-mini".into(),
            timeout_secs: 60,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    pub token: Option<String>,
    pub database_id: Option<String>,
    /// Page under which a missing message database gets created.
    pub parent_page_id: Option<String>,
    pub api_base_url: String,
    pub auto_create_database: bool,
    pub timeout_secs: u64,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: None,
            database_id: None,
            parent_page_id: None,
            api_base_url: DEFAULT_NOTION_API_BASE.into(),
            auto_create_database: true,
            timeout_secs: 30,
        }
    }
}

impl NotionConfig {
    pub fn is_enabled(&self) -> bool {
        self.token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "wxrelay=info,tower_http=info".into(),
        }
    }
}

impl Config {
    /// `<platform config dir>/wxrelay/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "wxrelay").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load the TOML file (falling back to defaults when it does not exist)
    /// and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path.as_deref() {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read config file {}", p.display()))?;
                let mut parsed = Self::from_toml_str(&raw)
                    .with_context(|| format!("failed to parse config file {}", p.display()))?;
                parsed.config_path = Some(p.to_path_buf());
                parsed
            }
            _ => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid config TOML")
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using the deployment's environment variable names.
    /// Blank values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(port) = get("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.gateway.port = port,
                Err(_) => self
                    .rejected_overrides
                    .push(format!("ignoring invalid PORT override: {port}")),
            }
        }
        if let Some(token) = get("OFFICIAL_TOKEN") {
            self.official.token = Some(token);
        }
        if let Some(url) = get("AI_API_URL") {
            self.ai.base_url = Some(url);
        }
        if let Some(key) = get("AI_API_KEY") {
            self.ai.api_key = Some(key);
        }
        if let Some(model) = get("AI_MODEL") {
            self.ai.model = model;
        }
        if let Some(token) = get("NOTION_TOKEN") {
            self.notion.token = Some(token);
        }
        if let Some(id) = get("NOTION_DATABASE_ID") {
            self.notion.database_id = Some(id);
        }
        if let Some(id) = get("NOTION_PARENT_PAGE_ID") {
            self.notion.parent_page_id = Some(id);
        }
    }

    /// Missing settings that degrade the relay without preventing startup.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = self.rejected_overrides.clone();
        if self
            .official
            .token
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .is_empty()
        {
            out.push("official.token is not set; URL verification will fail".to_string());
        }
        if self.ai.model.trim().is_empty() {
            out.push("ai.model is not set; AI replies will degrade".to_string());
        }
        if !self.notion.is_enabled() {
            out.push("notion.token is not set; messages will not be archived".to_string());
        } else if self.notion.database_id.is_none() && self.notion.parent_page_id.is_none() {
            out.push(
                "notion.database_id and notion.parent_page_id are both unset; archiving will fail"
                    .to_string(),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.gateway.port, 3001);
        assert!(cfg.official.verify_callbacks);
        assert_eq!(cfg.notion.api_base_url, DEFAULT_NOTION_API_BASE);
        assert!(cfg.notion.auto_create_database);
        assert!(!cfg.notion.is_enabled());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            [gateway]
            port = 8080

            [ai]
            model = "deepseek-chat"
            base_url = "https://api.deepseek.com/v1"

            [notion]
            token = "secret_x"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.gateway.port, 8080);
        assert_eq!(cfg.gateway.host, "0.0.0.0");
        assert_eq!(cfg.ai.model, "deepseek-chat");
        assert_eq!(cfg.ai.timeout_secs, 60);
        assert!(cfg.notion.is_enabled());
    }

    #[test]
    fn invalid_toml_is_rejected() {
        assert!(Config::from_toml_str("[gateway\nport = 1").is_err());
    }

    #[test]
    fn env_overrides_replace_file_values_and_skip_blanks() {
        let mut cfg = Config::default();
        cfg.ai.model = "from-file".into();
        let env: HashMap<&str, &str> = HashMap::from([
            ("PORT", "4000"),
            ("OFFICIAL_TOKEN", "wxtoken"),
            ("AI_MODEL", "from-env"),
            ("AI_API_KEY", "  "),
            ("NOTION_DATABASE_ID", "db1"),
        ]);
        cfg.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.gateway.port, 4000);
        assert_eq!(cfg.official.token.as_deref(), Some("wxtoken"));
        assert_eq!(cfg.ai.model, "from-env");
        assert_eq!(cfg.ai.api_key, None);
        assert_eq!(cfg.notion.database_id.as_deref(), Some("db1"));
    }

    #[test]
    fn invalid_port_override_is_ignored() {
        let mut cfg = Config::default();
        cfg.apply_overrides_from(|k| (k == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(cfg.gateway.port, 3001);
        assert!(cfg
            .warnings()
            .iter()
            .any(|w| w == "ignoring invalid PORT override: not-a-port"));
    }

    #[test]
    fn load_reads_file_and_records_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[official]\nverify_callbacks = false\n").unwrap();

        let cfg = Config::load(Some(&path)).unwrap();
        assert!(!cfg.official.verify_callbacks);
        assert_eq!(cfg.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(cfg.config_path.is_none());
        assert_eq!(cfg.gateway.max_body_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn warnings_flag_missing_token_and_store() {
        let cfg = Config::default();
        let warnings = cfg.warnings();
        assert!(warnings.iter().any(|w| w.contains("official.token")));
        assert!(warnings.iter().any(|w| w.contains("notion.token")));

        let mut cfg = Config::default();
        cfg.official.token = Some("t".into());
        cfg.notion.token = Some("n".into());
        cfg.notion.database_id = Some("db".into());
        assert!(cfg.warnings().is_empty());
    }
}
