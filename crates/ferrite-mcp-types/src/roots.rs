use serde::{Deserialize, Serialize};

/// A filesystem (or other URI-addressable) root a client exposes to a server,
/// symmetric to resources on the server side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Root {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
