//! Payload forwarded to the device transport after a successful update.

use serde::{Deserialize, Serialize};

use crate::parse::ParsedMessage;

/// Structured record handed to the transport.
///
/// Fields are copied verbatim from the parsed line, so the device sees the
/// same literal that was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardPayload {
    /// Signal reference
    pub link: String,

    /// Type tag (`I`, `F` or `B`)
    #[serde(rename = "type")]
    pub type_tag: String,

    /// Raw value literal
    pub value: String,
}

impl ForwardPayload {
    /// Encodes the payload as a single-line JSON object.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes a payload previously produced by [`ForwardPayload::encode`].
    pub fn decode(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<&ParsedMessage> for ForwardPayload {
    fn from(message: &ParsedMessage) -> Self {
        Self {
            link: message.link().to_string(),
            type_tag: message.raw_type_tag().to_string(),
            value: message.raw_value().to_string(),
        }
    }
}
