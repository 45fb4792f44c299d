//! WeChat Official Account wire format: signature check and the XML
//! envelopes of passive (synchronous) replies.

pub mod message;
pub mod signature;

pub use message::{format_text_reply, parse_inbound, InboundMessage, XmlError};
pub use signature::{compute_signature, verify_signature};
