use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A content block exchanged in tool results, prompt messages and sampling
/// payloads. Tagged on `type` per the wire format; unknown fields on a known
/// variant are preserved in `extra` rather than rejected, since servers may
/// attach vendor metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text {
        text: String,
        #[serde(flatten)]
        extra: HashMap<String, serde_json::Value>,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(flatten)]
        extra: HashMap<String, serde_json::Value>,
    },
    Audio {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(flatten)]
        extra: HashMap<String, serde_json::Value>,
    },
    #[serde(rename = "resource")]
    EmbeddedResource {
        resource: serde_json::Value,
        #[serde(flatten)]
        extra: HashMap<String, serde_json::Value>,
    },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text {
            text: text.into(),
            extra: HashMap::new(),
        }
    }
}
