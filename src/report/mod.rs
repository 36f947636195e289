//! Console output for answers and tool calls.

pub mod generator;

pub use generator::{generate_json_reply, render_reply, render_tool_call};
