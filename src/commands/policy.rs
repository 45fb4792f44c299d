use super::parser::ParseResult;

/// Where the reply text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplySource {
    /// Forward this content to the AI backend as a single user turn.
    Ai(String),
    /// Answer with this fixed text; the AI backend is not called.
    Canned(String),
}

/// What to do with one parsed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchDecision {
    pub reply: ReplySource,
    /// Archive the exchange to the message store.
    pub persist: bool,
}

impl DispatchDecision {
    pub fn content_for_ai(&self) -> Option<&str> {
        match &self.reply {
            ReplySource::Ai(content) => Some(content),
            ReplySource::Canned(_) => None,
        }
    }

    pub fn reply_override(&self) -> Option<&str> {
        match &self.reply {
            ReplySource::Canned(text) => Some(text),
            ReplySource::Ai(_) => None,
        }
    }
}

pub fn acknowledgement_text(keyword: &str) -> String {
    format!("已收到指令：{keyword}")
}

pub fn missing_argument_text(keyword: &str) -> String {
    format!("请在指令后输入你的问题，例如：{keyword} 请简单介绍一下自己")
}

/// Pure mapping from a parse result to a dispatch decision.
pub fn decide(parsed: &ParseResult<'_>) -> DispatchDecision {
    let Some(def) = parsed.definition else {
        return DispatchDecision {
            reply: ReplySource::Ai(parsed.residual_content.clone()),
            persist: true,
        };
    };

    let reply = if !def.invoke_ai {
        ReplySource::Canned(acknowledgement_text(&def.keyword))
    } else if parsed.residual_content.is_empty() {
        ReplySource::Canned(missing_argument_text(&def.keyword))
    } else {
        ReplySource::Ai(parsed.residual_content.clone())
    };

    DispatchDecision {
        reply,
        persist: def.save_to_store,
    }
}
