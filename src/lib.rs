//! WeChat Official Account relay.
//!
//! Inbound text messages are classified as slash commands or plain
//! messages, answered through an AI chat-completion backend and, depending
//! on the command, archived to a Notion database without delaying the reply.

pub mod commands;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod processor;
pub mod providers;
pub mod store;
pub mod wechat;

pub use config::Config;
pub use processor::{MessageProcessor, ProcessedMessage};
