//! Items emitted by nodes.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

/// One unit of node output: a JSON payload plus optional file content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionItem {
    pub json: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<BinaryData>,
    /// Index of the input item this output was produced from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paired_item: Option<usize>,
}

impl ExecutionItem {
    pub fn new(json: JsonValue) -> Self {
        Self {
            json,
            binary: None,
            paired_item: None,
        }
    }

    /// Builds the item recorded in place of a failed operation when the host
    /// asked to continue on failure.
    pub fn failed(error: &anyhow::Error) -> Self {
        Self::new(json!({
            "error": format!("{error:#}"),
            "timestamp": Utc::now(),
        }))
    }

    #[must_use]
    pub fn with_binary(mut self, binary: BinaryData) -> Self {
        self.binary = Some(binary);
        self
    }

    #[must_use]
    pub fn paired_with(mut self, index: usize) -> Self {
        self.paired_item = Some(index);
        self
    }

    /// Sets a top-level field on the JSON payload, turning a non-object
    /// payload into an object first.
    pub fn insert(&mut self, key: &str, value: JsonValue) {
        if !self.json.is_object() {
            self.json = JsonValue::Object(Map::new());
        }
        if let JsonValue::Object(map) = &mut self.json {
            map.insert(key.to_string(), value);
        }
    }
}

/// File content attached to an item, base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryData {
    pub data: String,
    pub mime_type: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

impl BinaryData {
    /// Fallback MIME type when the source does not report one.
    pub const DEFAULT_MIME_TYPE: &'static str = "application/octet-stream";

    pub fn from_bytes(
        bytes: &[u8],
        mime_type: Option<&str>,
        file_name: &str,
        file_size: Option<u64>,
    ) -> Self {
        Self {
            data: STANDARD.encode(bytes),
            mime_type: mime_type.unwrap_or(Self::DEFAULT_MIME_TYPE).to_string(),
            file_name: file_name.to_string(),
            file_size,
        }
    }

    /// Decodes the base64 payload.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }
}
