//! panelbus Protocol - Line protocol for panel communication
//!
//! This crate provides the single message shape received from panels
//! (`<signal> <type> <value>`), value coercion per type tag, and the
//! payload forwarded to the device transport.

pub mod message;
pub mod parse;

pub use message::ForwardPayload;
pub use parse::{ParseError, ParsedMessage, TypeTag, FIELD_COUNT, FIELD_SEPARATOR};
