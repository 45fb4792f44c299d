use super::registry::{CommandDefinition, CommandRegistry};

/// Outcome of matching one inbound message against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult<'r> {
    /// Borrowed from the registry; present iff the message is a command.
    pub definition: Option<&'r CommandDefinition>,
    /// Text after the keyword with surrounding whitespace removed, or the
    /// untouched original text for plain messages. An empty string on a
    /// command means "invoked without argument".
    pub residual_content: String,
}

impl<'r> ParseResult<'r> {
    fn plain(raw: &str) -> Self {
        Self {
            definition: None,
            residual_content: raw.to_string(),
        }
    }

    pub fn is_command(&self) -> bool {
        self.definition.is_some()
    }

    pub fn matched_keyword(&self) -> Option<&'r str> {
        self.definition.map(|def| def.keyword.as_str())
    }
}

/// Classify `raw_text` as a plain message or a command invocation.
///
/// Matching runs on a trimmed copy; the keyword must be a literal,
/// case-sensitive prefix and the longest matching keyword wins. Plain
/// messages keep their original text verbatim.
pub fn parse<'r>(registry: &'r CommandRegistry, raw_text: Option<&str>) -> ParseResult<'r> {
    let raw = match raw_text {
        Some(raw) if !raw.is_empty() => raw,
        other => return ParseResult::plain(other.unwrap_or_default()),
    };

    let trimmed = raw.trim();
    match registry.longest_prefix_match(trimmed) {
        Some(def) => ParseResult {
            definition: Some(def),
            residual_content: trimmed[def.keyword.len()..].trim().to_string(),
        },
        None => ParseResult::plain(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::registry::test_definition;

    #[test]
    fn plain_text_is_kept_verbatim() {
        let registry = CommandRegistry::builtin();
        for input in ["你好，我想了解一下你的功能", "  padded  ", "hello /ai", "ai /ai", "/AI upper"] {
            let parsed = parse(&registry, Some(input));
            assert!(!parsed.is_command(), "{input:?}");
            assert_eq!(parsed.matched_keyword(), None);
            assert_eq!(parsed.residual_content, input);
        }
    }

    #[test]
    fn absent_and_empty_input_are_plain() {
        let registry = CommandRegistry::builtin();
        for input in [None, Some("")] {
            let parsed = parse(&registry, input);
            assert!(!parsed.is_command());
            assert_eq!(parsed.residual_content, "");
        }
    }

    #[test]
    fn keyword_with_argument_yields_trimmed_residual() {
        let registry = CommandRegistry::builtin();
        for residual in ["请简单介绍一下自己", "  spaced out  ", "", "   ", "multi\nline"] {
            let input = format!("/ai {residual}");
            let parsed = parse(&registry, Some(&input));
            assert!(parsed.is_command(), "{input:?}");
            assert_eq!(parsed.matched_keyword(), Some("/ai"));
            assert_eq!(parsed.residual_content, residual.trim());
        }
    }

    #[test]
    fn bare_keyword_yields_empty_residual() {
        let registry = CommandRegistry::builtin();
        let parsed = parse(&registry, Some("/ai"));
        assert!(parsed.is_command());
        assert_eq!(parsed.residual_content, "");

        let parsed = parse(&registry, Some("  /ai \n"));
        assert!(parsed.is_command());
        assert_eq!(parsed.residual_content, "");
    }

    #[test]
    fn leading_whitespace_before_keyword_is_ignored() {
        let registry = CommandRegistry::builtin();
        let parsed = parse(&registry, Some("\u{3000} /ai 今天是几号？"));
        assert_eq!(parsed.matched_keyword(), Some("/ai"));
        assert_eq!(parsed.residual_content, "今天是几号？");
    }

    #[test]
    fn keyword_is_a_literal_prefix() {
        let registry = CommandRegistry::builtin();
        let parsed = parse(&registry, Some("/aiquestion"));
        assert_eq!(parsed.matched_keyword(), Some("/ai"));
        assert_eq!(parsed.residual_content, "question");
    }

    #[test]
    fn overlapping_keywords_resolve_to_most_specific() {
        let registry = CommandRegistry::new(vec![
            test_definition("/a", true, false),
            test_definition("/ai", false, true),
        ])
        .unwrap();

        let parsed = parse(&registry, Some("/ai hello"));
        assert_eq!(parsed.matched_keyword(), Some("/ai"));
        assert_eq!(parsed.residual_content, "hello");

        let parsed = parse(&registry, Some("/a hello"));
        assert_eq!(parsed.matched_keyword(), Some("/a"));
        assert_eq!(parsed.residual_content, "hello");
    }

    #[test]
    fn empty_registry_never_matches() {
        let registry = CommandRegistry::new(Vec::new()).unwrap();
        let parsed = parse(&registry, Some("/ai hello"));
        assert!(!parsed.is_command());
        assert_eq!(parsed.residual_content, "/ai hello");
    }
}
