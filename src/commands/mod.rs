//! Slash-command handling for inbound text messages.
//!
//! A message either starts with a registered keyword (a command) or is a
//! plain message. [`parse`] classifies it, [`decide`] turns the result into
//! "what goes to the AI backend" and "is the exchange archived".

pub mod help;
pub mod parser;
pub mod policy;
pub mod registry;

pub use help::generate_help_text;
pub use parser::{parse, ParseResult};
pub use policy::{acknowledgement_text, decide, missing_argument_text, DispatchDecision, ReplySource};
pub use registry::{
    builtin_definitions, CommandDefinition, CommandRegistry, RegistryError, AI_COMMAND,
};
