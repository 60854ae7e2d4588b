//! MCP protocol type definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tool definition published in `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name, unique within the registry
    pub name: String,
    /// Tool description
    pub description: String,
    /// Input JSON Schema
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// Output JSON Schema
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// Content item in a tool response
///
/// Unknown block types pass through untouched via the `Other` branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Text content
    #[serde(rename = "text")]
    Text {
        /// Text value
        text: String,
    },
    /// Input text content (Responses API follow-up block)
    #[serde(rename = "input_text")]
    InputText {
        /// Text value
        text: String,
    },
    /// Opaque passthrough for block types the gateway does not interpret
    #[serde(untagged)]
    Other(Value),
}

impl ContentBlock {
    /// Create a `text` block
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an `input_text` block
    pub fn input_text(text: impl Into<String>) -> Self {
        Self::InputText { text: text.into() }
    }

    /// The text carried by this block, if any
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } | Self::InputText { text } => Some(text),
            Self::Other(value) => value.get("text").and_then(Value::as_str),
        }
    }
}

/// A provider-issued function call surfaced to the MCP client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque call identifier, echoed verbatim in `function_call_output`
    pub id: Option<String>,
    /// Name of the requested tool
    #[serde(rename = "toolName")]
    pub name: Option<String>,
    /// Parsed arguments object
    #[serde(default)]
    pub arguments: Value,
}

/// Uniform return value of every tool handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Content blocks
    pub content: Vec<ContentBlock>,
    /// Calls deferred to the MCP client (hosted tools)
    #[serde(rename = "toolCalls")]
    pub tool_calls: Vec<ToolCall>,
    /// Whether this response represents a failure
    #[serde(rename = "isError")]
    pub is_error: bool,
    /// Response metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ToolResponse {
    /// Successful response
    #[must_use]
    pub fn ok(
        content: Vec<ContentBlock>,
        tool_calls: Vec<ToolCall>,
        metadata: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            content,
            tool_calls,
            is_error: false,
            metadata: metadata.filter(|m| !m.is_empty()),
        }
    }

    /// Error response with a single text block
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            tool_calls: Vec::new(),
            is_error: true,
            metadata: None,
        }
    }

    /// Error response carrying metadata
    pub fn error_with_metadata(
        message: impl Into<String>,
        metadata: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            metadata: metadata.filter(|m| !m.is_empty()),
            ..Self::error(message)
        }
    }

    /// Insert a metadata entry, creating the map when absent
    pub fn insert_metadata(&mut self, key: &str, value: Value) {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
    }
}

/// Client/Server info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    /// Name
    pub name: String,
    /// Version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    // ── ContentBlock ──────────────────────────────────────────────────

    #[test]
    fn text_block_serializes_with_type_tag() {
        let block = ContentBlock::text("hi");
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({"type": "text", "text": "hi"})
        );
    }

    #[test]
    fn input_text_block_round_trips() {
        let block = ContentBlock::input_text("recorded");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "input_text");
        let back: ContentBlock = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn unknown_block_type_passes_through() {
        let raw = json!({"type": "image", "data": "abc", "mimeType": "image/png"});
        let block: ContentBlock = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(block, ContentBlock::Other(raw.clone()));
        assert_eq!(serde_json::to_value(&block).unwrap(), raw);
    }

    #[test]
    fn as_text_reads_known_and_opaque_blocks() {
        assert_eq!(ContentBlock::text("a").as_text(), Some("a"));
        assert_eq!(ContentBlock::input_text("b").as_text(), Some("b"));
        let opaque = ContentBlock::Other(json!({"type": "output_text", "text": "c"}));
        assert_eq!(opaque.as_text(), Some("c"));
        let no_text = ContentBlock::Other(json!({"type": "image", "data": "x"}));
        assert_eq!(no_text.as_text(), None);
    }

    // ── ToolResponse ──────────────────────────────────────────────────

    #[test]
    fn ok_response_uses_camel_case_wire_fields() {
        let resp = ToolResponse::ok(vec![ContentBlock::text("hi")], vec![], None);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["isError"], false);
        assert!(json["toolCalls"].as_array().unwrap().is_empty());
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn error_response_carries_message_block() {
        let resp = ToolResponse::error("boom");
        assert!(resp.is_error);
        assert_eq!(resp.content[0].as_text(), Some("boom"));
        assert!(resp.tool_calls.is_empty());
    }

    #[test]
    fn empty_metadata_is_dropped() {
        let resp = ToolResponse::ok(vec![], vec![], Some(Map::new()));
        assert!(resp.metadata.is_none());
    }

    #[test]
    fn insert_metadata_creates_map() {
        let mut resp = ToolResponse::error("x");
        resp.insert_metadata("thinkTool", json!([]));
        assert!(resp.metadata.unwrap().contains_key("thinkTool"));
    }

    // ── ToolCall ──────────────────────────────────────────────────────

    #[test]
    fn tool_call_serializes_tool_name_field() {
        let call = ToolCall {
            id: Some("c1".to_string()),
            name: Some("web_search".to_string()),
            arguments: json!({"q": "rust"}),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["id"], "c1");
        assert_eq!(json["toolName"], "web_search");
        assert_eq!(json["arguments"]["q"], "rust");
    }
}
