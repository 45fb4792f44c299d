use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
#[error("invalid WeChat XML: {0}")]
pub struct XmlError(#[from] quick_xml::DeError);

/// Fields of an Official Account callback the relay looks at.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InboundMessage {
    /// Official Account original id (the bot).
    pub to_user_name: String,
    /// OpenID of the user.
    pub from_user_name: String,
    #[serde(default)]
    pub create_time: Option<i64>,
    pub msg_type: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub msg_id: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
}

impl InboundMessage {
    pub fn is_text(&self) -> bool {
        self.msg_type == "text"
    }

    pub fn is_event(&self) -> bool {
        self.msg_type == "event"
    }
}

/// Decode an `<xml>...</xml>` callback body.
pub fn parse_inbound(xml: &str) -> Result<InboundMessage, XmlError> {
    Ok(quick_xml::de::from_str(xml)?)
}

/// The XML 1.0 `Char` production.
fn is_xml_char(ch: char) -> bool {
    matches!(
        ch,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..
    )
}

/// Wrap `value` in CDATA. Characters XML cannot carry are dropped and any
/// `]]>` is split across two sections.
fn cdata(value: &str) -> String {
    let cleaned: String = value.chars().filter(|c| is_xml_char(*c)).collect();
    format!(
        "<![CDATA[{}]]>",
        cleaned.replace("]]>", "]]]]><![CDATA[>")
    )
}

/// Passive text reply. `to_user` is the user who sent the message,
/// `from_user` the Official Account.
pub fn format_text_reply(to_user: &str, from_user: &str, content: &str, create_time: i64) -> String {
    format!(
        "<xml>\n  <ToUserName>{}</ToUserName>\n  <FromUserName>{}</FromUserName>\n  <CreateTime>{create_time}</CreateTime>\n  <MsgType><![CDATA[text]]></MsgType>\n  <Content>{}</Content>\n</xml>",
        cdata(to_user),
        cdata(from_user),
        cdata(content),
    )
}
