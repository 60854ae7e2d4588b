//! Builtin tool handlers

mod builtin;

pub use builtin::{EchoTool, ReadFileTool};
