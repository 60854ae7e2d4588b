//! `echo` and `read_file` tool handlers
//!
//! `read_file` is sandboxed to a base directory: absolute paths and parent
//! traversal are rejected before touching the filesystem, and the resolved
//! target must still live under the base after canonicalization.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use crate::protocol::{ContentBlock, ToolResponse, ToolSpec};
use crate::registry::ToolHandler;

/// Default cap on bytes returned by `read_file`
const DEFAULT_MAX_BYTES: u64 = 200_000;

/// Echo text back
pub struct EchoTool;

impl EchoTool {
    /// Tool spec published in `tools/list`
    #[must_use]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "echo".to_string(),
            description: "Echo text back.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "Text to echo"},
                },
                "required": ["text"],
                "additionalProperties": false,
            }),
            output_schema: Some(json!({
                "type": "object",
                "properties": {
                    "content": {"type": "array", "description": "Single text block"},
                    "isError": {"type": "boolean"},
                },
            })),
        }
    }
}

#[async_trait]
impl ToolHandler for EchoTool {
    async fn call(&self, arguments: Value, _cancel: CancellationToken) -> ToolResponse {
        match arguments.get("text").and_then(Value::as_str) {
            Some(text) => ToolResponse::ok(vec![ContentBlock::text(text)], vec![], None),
            None => ToolResponse::error("Invalid params: 'text' must be a string"),
        }
    }
}

/// Read a UTF-8 text file from the sandboxed base directory
pub struct ReadFileTool {
    base_dir: PathBuf,
}

impl ReadFileTool {
    /// Create a handler sandboxed to `base_dir`
    #[must_use]
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Tool spec published in `tools/list`
    #[must_use]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "read_file".to_string(),
            description: "Read a UTF-8 text file from the server's base directory (relative path)."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Relative path under the base directory"},
                    "max_bytes": {
                        "type": "integer",
                        "description": "Max bytes to read",
                        "minimum": 1,
                        "default": DEFAULT_MAX_BYTES,
                    },
                },
                "required": ["path"],
                "additionalProperties": false,
            }),
            output_schema: Some(json!({
                "type": "object",
                "properties": {
                    "content": {"type": "array"},
                    "isError": {"type": "boolean"},
                },
            })),
        }
    }

    fn read(&self, path: &str, max_bytes: u64) -> Result<(String, usize), String> {
        let raw = Path::new(path);
        if raw.is_absolute()
            || raw
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err("Invalid path (absolute paths and traversal are not allowed)".to_string());
        }

        let target = self.base_dir.join(raw);
        let canonical = target
            .canonicalize()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => "File not found".to_string(),
                _ => format!("{e}"),
            })?;
        let base = self
            .base_dir
            .canonicalize()
            .map_err(|e| format!("Base directory unavailable: {e}"))?;
        if !canonical.starts_with(&base) {
            return Err("Path escapes base directory".to_string());
        }

        let data = std::fs::read(&canonical).map_err(|e| format!("{e}"))?;
        let limit = usize::try_from(max_bytes.max(1)).unwrap_or(usize::MAX);
        let slice = &data[..data.len().min(limit)];
        Ok((String::from_utf8_lossy(slice).into_owned(), slice.len()))
    }
}

#[async_trait]
impl ToolHandler for ReadFileTool {
    async fn call(&self, arguments: Value, _cancel: CancellationToken) -> ToolResponse {
        let Some(path) = arguments.get("path").and_then(Value::as_str) else {
            return ToolResponse::error("Invalid params: 'path' must be a string");
        };
        let max_bytes = match arguments.get("max_bytes") {
            None => DEFAULT_MAX_BYTES,
            Some(value) => match value.as_u64() {
                Some(v) => v,
                None => {
                    return ToolResponse::error(
                        "Invalid params: 'max_bytes' must be an integer",
                    );
                }
            },
        };

        match self.read(path, max_bytes) {
            Ok((text, size)) => {
                let mut metadata = Map::new();
                metadata.insert("path".to_string(), json!(path));
                metadata.insert("size".to_string(), json!(size));
                ToolResponse::ok(vec![ContentBlock::text(text)], vec![], Some(metadata))
            }
            Err(message) => {
                let mut metadata = Map::new();
                metadata.insert("path".to_string(), json!(path));
                ToolResponse::error_with_metadata(message, Some(metadata))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mcp-chat-gateway-test-{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    // ── echo ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn echo_returns_text() {
        let resp = EchoTool
            .call(json!({"text": "hi"}), CancellationToken::new())
            .await;
        assert!(!resp.is_error);
        assert_eq!(resp.content, vec![ContentBlock::text("hi")]);
        assert!(resp.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn echo_rejects_missing_text() {
        let resp = EchoTool.call(json!({}), CancellationToken::new()).await;
        assert!(resp.is_error);
        assert!(resp.content[0].as_text().unwrap().contains("'text'"));
    }

    #[tokio::test]
    async fn echo_rejects_non_string_text() {
        let resp = EchoTool
            .call(json!({"text": 42}), CancellationToken::new())
            .await;
        assert!(resp.is_error);
    }

    // ── read_file ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn read_file_returns_contents() {
        let dir = scratch_dir("read-ok");
        std::fs::write(dir.join("notes.md"), "hello notes").unwrap();
        let tool = ReadFileTool::new(dir);
        let resp = tool
            .call(json!({"path": "notes.md"}), CancellationToken::new())
            .await;
        assert!(!resp.is_error);
        assert_eq!(resp.content[0].as_text(), Some("hello notes"));
        let metadata = resp.metadata.unwrap();
        assert_eq!(metadata["path"], "notes.md");
        assert_eq!(metadata["size"], 11);
    }

    #[tokio::test]
    async fn read_file_honors_max_bytes() {
        let dir = scratch_dir("read-cap");
        std::fs::write(dir.join("big.txt"), "0123456789").unwrap();
        let tool = ReadFileTool::new(dir);
        let resp = tool
            .call(
                json!({"path": "big.txt", "max_bytes": 4}),
                CancellationToken::new(),
            )
            .await;
        assert_eq!(resp.content[0].as_text(), Some("0123"));
    }

    #[tokio::test]
    async fn read_file_rejects_absolute_path() {
        let tool = ReadFileTool::new(scratch_dir("read-abs"));
        let resp = tool
            .call(json!({"path": "/etc/passwd"}), CancellationToken::new())
            .await;
        assert!(resp.is_error);
        assert!(resp.content[0].as_text().unwrap().contains("Invalid path"));
    }

    #[tokio::test]
    async fn read_file_rejects_traversal() {
        let tool = ReadFileTool::new(scratch_dir("read-dotdot"));
        let resp = tool
            .call(json!({"path": "../secrets.txt"}), CancellationToken::new())
            .await;
        assert!(resp.is_error);
    }

    #[tokio::test]
    async fn read_file_missing_file_is_tool_error() {
        let tool = ReadFileTool::new(scratch_dir("read-missing"));
        let resp = tool
            .call(json!({"path": "nope.txt"}), CancellationToken::new())
            .await;
        assert!(resp.is_error);
        assert_eq!(resp.content[0].as_text(), Some("File not found"));
        assert_eq!(resp.metadata.unwrap()["path"], "nope.txt");
    }

    #[tokio::test]
    async fn read_file_rejects_bad_max_bytes() {
        let tool = ReadFileTool::new(scratch_dir("read-badmax"));
        let resp = tool
            .call(
                json!({"path": "x.txt", "max_bytes": "lots"}),
                CancellationToken::new(),
            )
            .await;
        assert!(resp.is_error);
        assert!(resp.content[0].as_text().unwrap().contains("max_bytes"));
    }

    #[tokio::test]
    async fn read_file_rejects_missing_path() {
        let tool = ReadFileTool::new(scratch_dir("read-nopath"));
        let resp = tool.call(json!({}), CancellationToken::new()).await;
        assert!(resp.is_error);
    }
}
