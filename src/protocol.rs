//! Wire types for the Ollama HTTP API.
//!
//! Only the fields this client reads are typed; everything else the server
//! sends is carried through untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single role-tagged chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Ordered chat turns for one run of the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, keeping insertion order.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

/// A model entry from `GET /api/tags`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    #[serde(default = "unnamed")]
    pub name: String,
    /// Size on disk in bytes; `null` reads as 0.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ModelDetails>,
    /// Fields we don't interpret (digest, modified_at, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn unnamed() -> String {
    "unnamed".to_string()
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or_default())
}

impl ModelDescriptor {
    /// Parameter count label such as `8B`, if the server reported one.
    pub fn parameter_size(&self) -> Option<&str> {
        self.details
            .as_ref()
            .and_then(|d| d.parameter_size.as_deref())
    }
}

/// The `details` sub-object of a model entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_size: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Raw `/api/tags` body. Entries are decoded one by one so a single odd
/// entry does not hide the rest.
#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    models: Vec<Value>,
}

impl TagsResponse {
    /// Decoded models, skipping entries that don't look like a model.
    pub fn into_models(self) -> Vec<ModelDescriptor> {
        self.models
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(model) => Some(model),
                Err(e) => {
                    debug!("Skipping malformed model entry: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// A scalar model-tuning value, sent as-is in `options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<u32> for OptionValue {
    fn from(v: u32) -> Self {
        OptionValue::Int(i64::from(v))
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

impl FromStr for OptionValue {
    type Err = std::convert::Infallible;

    /// Tries bool, then integer, then float; anything else is text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(b) = s.parse::<bool>() {
            return Ok(OptionValue::Bool(b));
        }
        if let Ok(i) = s.parse::<i64>() {
            return Ok(OptionValue::Int(i));
        }
        if let Ok(f) = s.parse::<f64>() {
            return Ok(OptionValue::Float(f));
        }
        Ok(OptionValue::Text(s.to_string()))
    }
}

/// Open map of model options, e.g. `temperature` or `num_ctx`.
///
/// Names and values are not validated; the server decides what it accepts.
pub type ChatOptions = BTreeMap<String, OptionValue>;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
    pub options: &'a ChatOptions,
}

/// Reply text from a chat response, when it has the expected shape.
pub fn reply_content(response: &Value) -> Option<&str> {
    response.get("message")?.get("content")?.as_str()
}

/// Reply message from a chat response, when it has the expected shape.
pub fn reply_message(response: &Value) -> Option<ChatMessage> {
    serde_json::from_value(response.get("message")?.clone()).ok()
}
