//! Per-session conversation log.
//!
//! Each session writes `session_<YYYYmmdd_HHMMSS>.json` under the log
//! directory. The whole file is rewritten after every entry.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result previews longer than this are truncated.
pub const PREVIEW_MAX_CHARS: usize = 1000;

const TRUNCATED_SUFFIX: &str = "... [truncated]";

/// One logged event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEntry {
    UserMessage {
        timestamp: DateTime<Local>,
        content: String,
    },
    ToolCall {
        timestamp: DateTime<Local>,
        tool_name: String,
        parameters: Value,
        result_preview: Value,
    },
    AssistantResponse {
        timestamp: DateTime<Local>,
        content: Value,
    },
    Error {
        timestamp: DateTime<Local>,
        error_type: String,
        error_message: String,
    },
    MemoryCleared {
        timestamp: DateTime<Local>,
    },
}

#[derive(Debug, Clone, Serialize)]
struct SessionData {
    session_start: DateTime<Local>,
    conversations: Vec<SessionEntry>,
}

fn take_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Shorten a tool result for the log.
pub fn truncate_result(result: &Value, max_chars: usize) -> Value {
    match result {
        Value::String(s) if s.chars().count() > max_chars => {
            Value::String(format!("{}{}", take_chars(s, max_chars), TRUNCATED_SUFFIX))
        }
        Value::Object(_) => {
            let encoded = result.to_string();
            if encoded.chars().count() > max_chars {
                json!({ "_preview": format!("{}{}", take_chars(&encoded, max_chars), TRUNCATED_SUFFIX) })
            } else {
                result.clone()
            }
        }
        Value::Array(items) => {
            if result.to_string().chars().count() > max_chars {
                let sample: Vec<Value> = items.iter().take(2).cloned().collect();
                json!({
                    "_preview": format!("List with {} items", items.len()),
                    "_sample": sample
                })
            } else {
                result.clone()
            }
        }
        other => other.clone(),
    }
}

/// Writes conversation events to a JSON file.
pub struct SessionLogger {
    session_file: PathBuf,
    data: SessionData,
}

impl SessionLogger {
    /// Start a new session under `log_dir`, creating it if needed.
    pub fn new(log_dir: &Path) -> Result<Self> {
        fs::create_dir_all(log_dir).with_context(|| {
            format!("Failed to create log directory: {}", log_dir.display())
        })?;

        let now = Local::now();
        let session_file = log_dir.join(format!("session_{}.json", now.format("%Y%m%d_%H%M%S")));

        let logger = Self {
            session_file,
            data: SessionData {
                session_start: now,
                conversations: Vec::new(),
            },
        };
        logger.save()?;

        Ok(logger)
    }

    pub fn session_file(&self) -> &Path {
        &self.session_file
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.data.conversations
    }

    fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.data)
            .context("Failed to serialize session log")?;
        fs::write(&self.session_file, content).with_context(|| {
            format!("Failed to write session log: {}", self.session_file.display())
        })?;
        Ok(())
    }

    fn push(&mut self, entry: SessionEntry) -> Result<()> {
        debug!("Session log entry: {:?}", entry);
        self.data.conversations.push(entry);
        self.save()
    }

    pub fn log_user_message(&mut self, message: &str) -> Result<()> {
        self.push(SessionEntry::UserMessage {
            timestamp: Local::now(),
            content: message.to_string(),
        })
    }

    pub fn log_tool_call(&mut self, tool_name: &str, parameters: &Value, result: &Value) -> Result<()> {
        self.push(SessionEntry::ToolCall {
            timestamp: Local::now(),
            tool_name: tool_name.to_string(),
            parameters: parameters.clone(),
            result_preview: truncate_result(result, PREVIEW_MAX_CHARS),
        })
    }

    pub fn log_assistant_response(&mut self, content: Value) -> Result<()> {
        self.push(SessionEntry::AssistantResponse {
            timestamp: Local::now(),
            content,
        })
    }

    pub fn log_error(&mut self, error_type: &str, message: &str) -> Result<()> {
        self.push(SessionEntry::Error {
            timestamp: Local::now(),
            error_type: error_type.to_string(),
            error_message: message.to_string(),
        })
    }

    pub fn log_memory_cleared(&mut self) -> Result<()> {
        self.push(SessionEntry::MemoryCleared {
            timestamp: Local::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_log(logger: &SessionLogger) -> Value {
        let content = fs::read_to_string(logger.session_file()).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    #[test]
    fn test_new_session_writes_file() {
        let temp = TempDir::new().unwrap();
        let logger = SessionLogger::new(&temp.path().join("logs")).unwrap();

        let name = logger.session_file().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("session_"));
        assert!(name.ends_with(".json"));

        let log = read_log(&logger);
        assert!(log["session_start"].is_string());
        assert_eq!(log["conversations"], json!([]));
    }

    #[test]
    fn test_entries_are_tagged() {
        let temp = TempDir::new().unwrap();
        let mut logger = SessionLogger::new(temp.path()).unwrap();

        logger.log_user_message("How many asthma trials?").unwrap();
        logger
            .log_tool_call("count_trials", &json!({"condition": "asthma"}), &json!({"count": 3, "is_exact": true}))
            .unwrap();
        logger.log_assistant_response(json!("There are 3.")).unwrap();
        logger.log_error("AgentError", "boom").unwrap();
        logger.log_memory_cleared().unwrap();

        let log = read_log(&logger);
        let kinds: Vec<_> = log["conversations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["type"].as_str().unwrap().to_string())
            .collect();

        assert_eq!(
            kinds,
            vec!["user_message", "tool_call", "assistant_response", "error", "memory_cleared"]
        );
        assert_eq!(log["conversations"][1]["result_preview"]["count"], 3);
        assert_eq!(log["conversations"][3]["error_type"], "AgentError");
        assert_eq!(logger.entries().len(), 5);
    }

    #[test]
    fn test_truncate_long_string() {
        let long = Value::String("a".repeat(1500));
        let preview = truncate_result(&long, PREVIEW_MAX_CHARS);
        let text = preview.as_str().unwrap();

        assert!(text.ends_with("... [truncated]"));
        assert_eq!(text.chars().count(), 1000 + TRUNCATED_SUFFIX.len());
    }

    #[test]
    fn test_truncate_long_object() {
        let big = json!({"inclusion": ["x".repeat(2000)]});
        let preview = truncate_result(&big, PREVIEW_MAX_CHARS);

        assert!(preview["_preview"].as_str().unwrap().ends_with("... [truncated]"));
    }

    #[test]
    fn test_truncate_long_list() {
        let items: Vec<Value> = (0..100).map(|i| json!({"nctId": format!("NCT{:08}", i)})).collect();
        let preview = truncate_result(&Value::Array(items), PREVIEW_MAX_CHARS);

        assert_eq!(preview["_preview"], "List with 100 items");
        assert_eq!(preview["_sample"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_short_results_unchanged() {
        let small = json!({"count": 1, "is_exact": true});
        assert_eq!(truncate_result(&small, PREVIEW_MAX_CHARS), small);
        assert_eq!(truncate_result(&json!(42), PREVIEW_MAX_CHARS), json!(42));
    }
}
