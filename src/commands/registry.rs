use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

/// Keyword of the "answer only, do not archive" command.
pub const AI_COMMAND: &str = "/ai";

/// One recognized slash command and the flags that steer dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDefinition {
    /// Literal, case-sensitive prefix (e.g. `/ai`).
    pub keyword: String,
    pub name: String,
    /// Only used to render help text.
    pub description: String,
    /// Exchanges using this command are archived to the message store.
    pub save_to_store: bool,
    /// Residual content is forwarded to the AI backend. When false the user
    /// gets a fixed acknowledgement instead.
    pub invoke_ai: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("command keyword must not be empty")]
    EmptyKeyword,
    #[error("command keyword must not contain whitespace: {0:?}")]
    WhitespaceInKeyword(String),
    #[error("duplicate command keyword: {0}")]
    DuplicateKeyword(String),
}

/// Immutable keyword table. Built once at startup and shared read-only
/// between concurrent message handlers.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    definitions: Vec<CommandDefinition>,
    by_keyword: HashMap<String, usize>,
    /// Indices into `definitions`, longest keyword first.
    by_specificity: Vec<usize>,
}

/// The commands shipped with the relay.
pub fn builtin_definitions() -> Vec<CommandDefinition> {
    vec![CommandDefinition {
        keyword: AI_COMMAND.to_string(),
        name: "AI回答".to_string(),
        description: "仅进行AI回答，不记录到Notion".to_string(),
        save_to_store: false,
        invoke_ai: true,
    }]
}

impl CommandRegistry {
    /// Validate and index a set of definitions.
    pub fn new(definitions: Vec<CommandDefinition>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for def in &definitions {
            if def.keyword.is_empty() {
                return Err(RegistryError::EmptyKeyword);
            }
            if def.keyword.chars().any(char::is_whitespace) {
                return Err(RegistryError::WhitespaceInKeyword(def.keyword.clone()));
            }
            if !seen.insert(def.keyword.as_str()) {
                return Err(RegistryError::DuplicateKeyword(def.keyword.clone()));
            }
        }
        Ok(Self::index(definitions))
    }

    /// Registry containing [`builtin_definitions`].
    pub fn builtin() -> Self {
        Self::index(builtin_definitions())
    }

    /// Process-wide shared instance of the built-in registry.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<CommandRegistry>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(Self::builtin())).clone()
    }

    fn index(definitions: Vec<CommandDefinition>) -> Self {
        let by_keyword = definitions
            .iter()
            .enumerate()
            .map(|(idx, def)| (def.keyword.clone(), idx))
            .collect();

        let mut by_specificity: Vec<usize> = (0..definitions.len()).collect();
        by_specificity.sort_by(|a, b| {
            definitions[*b]
                .keyword
                .len()
                .cmp(&definitions[*a].keyword.len())
        });

        Self {
            definitions,
            by_keyword,
            by_specificity,
        }
    }

    /// Exact keyword lookup. Unknown keywords are simply absent.
    pub fn lookup(&self, keyword: &str) -> Option<&CommandDefinition> {
        self.by_keyword
            .get(keyword)
            .map(|idx| &self.definitions[*idx])
    }

    /// The most specific command whose keyword is a literal prefix of `text`.
    pub fn longest_prefix_match(&self, text: &str) -> Option<&CommandDefinition> {
        self.by_specificity
            .iter()
            .map(|idx| &self.definitions[*idx])
            .find(|def| text.starts_with(def.keyword.as_str()))
    }

    /// Definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
pub(crate) fn test_definition(keyword: &str, save_to_store: bool, invoke_ai: bool) -> CommandDefinition {
    CommandDefinition {
        keyword: keyword.to_string(),
        name: keyword.trim_start_matches('/').to_string(),
        description: format!("test command {keyword}"),
        save_to_store,
        invoke_ai,
    }
}
