use super::registry::{CommandRegistry, AI_COMMAND};
use std::fmt::Write as _;

/// Render the list of commands, followed by usage hints.
pub fn generate_help_text(registry: &CommandRegistry) -> String {
    let mut text = String::from("🤖 支持的指令：\n\n");
    for def in registry.iter() {
        let _ = writeln!(text, "{} - {}", def.keyword, def.description);
    }

    text.push_str("\n💡 使用方法：\n");
    if registry.lookup(AI_COMMAND).is_some() {
        let _ = writeln!(
            text,
            "• 发送 \"{AI_COMMAND} 你的问题\" 进行AI对话（不记录）"
        );
    }
    text.push_str("• 直接发送消息进行AI分析并记录到数据库\n");
    text
}
