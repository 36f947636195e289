//! The reasoning oracle: picks operations and writes the final answer.
//!
//! [`OllamaOracle`] talks to an Ollama chat endpoint. Tool selection uses
//! the native tool-calling API; the final answer is requested with a JSON
//! schema in the `format` field and parsed into a [`FeasibilityResponse`].

use crate::agent::tools::{ToolCall, ToolDefinition};
use crate::models::FeasibilityResponse;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Message in the chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn with_role(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role("assistant", content)
    }

    /// An assistant turn that requested tool calls.
    pub fn assistant_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::with_role("assistant", content)
        }
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_name: Some(name.into()),
            ..Self::with_role("tool", content)
        }
    }
}

/// What the oracle decided to do with the conversation so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    /// Free text reply; the final answer when there are no invocations.
    pub content: String,
    pub invocations: Vec<ToolCall>,
}

impl Decision {
    pub fn reply(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            invocations: Vec::new(),
        }
    }

    pub fn calls(invocations: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            invocations,
        }
    }
}

/// A reasoning oracle that can call operations and assemble answers.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Choose operations to run, or reply directly.
    async fn decide(&self, history: &[ChatMessage], catalog: &[ToolDefinition])
        -> Result<Decision>;

    /// Turn the history, including tool results, into a structured answer.
    async fn summarize(&self, history: &[ChatMessage]) -> Result<FeasibilityResponse>;
}

/// Configuration for the Ollama oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.1:8b".to_string(),
            temperature: 0.1,
            timeout_seconds: 300,
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<Value>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

impl From<ResponseMessage> for Decision {
    fn from(message: ResponseMessage) -> Self {
        Self {
            content: message.content,
            invocations: message.tool_calls.unwrap_or_default(),
        }
    }
}

/// JSON schema of [`FeasibilityResponse`] for structured output.
pub fn feasibility_schema() -> Value {
    let optional_string = json!({"type": ["string", "null"]});

    json!({
        "type": "object",
        "properties": {
            "answer": {"type": "string"},
            "trials": {
                "type": ["array", "null"],
                "items": {
                    "type": "object",
                    "properties": {
                        "nct_id": {"type": "string"},
                        "title": {"type": "string"},
                        "phase": optional_string,
                        "status": optional_string,
                        "sponsor": optional_string,
                        "enrollment": {"type": ["integer", "null"]},
                        "start_date": optional_string,
                        "completion_date": optional_string
                    },
                    "required": ["nct_id", "title"]
                }
            },
            "sites": {
                "type": ["array", "null"],
                "items": {
                    "type": "object",
                    "properties": {
                        "nct_id": {"type": "string"},
                        "facility": {"type": "string"},
                        "city": optional_string,
                        "country": optional_string
                    },
                    "required": ["nct_id", "facility"]
                }
            },
            "criteria": {
                "type": ["object", "null"],
                "properties": {
                    "inclusion": {"type": "array", "items": {"type": "string"}},
                    "exclusion": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["inclusion", "exclusion"]
            },
            "sources": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["answer", "sources"]
    })
}

/// Parse structured-output content, falling back to a plain answer.
fn parse_feasibility(content: &str) -> FeasibilityResponse {
    match serde_json::from_str::<FeasibilityResponse>(content.trim()) {
        Ok(response) => response,
        Err(e) => {
            warn!("Model did not return a structured answer: {}", e);
            FeasibilityResponse {
                answer: content.trim().to_string(),
                trials: None,
                sites: None,
                criteria: None,
                sources: Vec::new(),
            }
        }
    }
}

/// Oracle backed by a local or remote Ollama server.
pub struct OllamaOracle {
    config: OracleConfig,
    http_client: reqwest::Client,
}

impl OllamaOracle {
    pub fn new(config: OracleConfig) -> Result<Self> {
        info!("Initializing oracle with model {}", config.model_name);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn request<'a>(
        &'a self,
        history: &'a [ChatMessage],
        tools: Vec<Value>,
        format: Option<Value>,
    ) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model: &self.config.model_name,
            messages: history,
            tools,
            format,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        }
    }

    async fn chat(&self, request: &OllamaChatRequest<'_>) -> Result<ResponseMessage> {
        let url = format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'));

        debug!("Sending chat request with {} messages", request.messages.len());

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow::anyhow!(
                        "Request timed out after {}s. Try a different model.",
                        self.config.timeout_seconds
                    )
                } else if e.is_connect() {
                    anyhow::anyhow!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.config.ollama_url
                    )
                } else {
                    anyhow::anyhow!("Failed to send request: {}", e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Ollama API error {}: {}", status, body));
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(chat_response.message)
    }
}

#[async_trait]
impl ReasoningOracle for OllamaOracle {
    async fn decide(
        &self,
        history: &[ChatMessage],
        catalog: &[ToolDefinition],
    ) -> Result<Decision> {
        let tools = catalog
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to encode tool definitions")?;

        let message = self.chat(&self.request(history, tools, None)).await?;
        let decision = Decision::from(message);

        debug!("Oracle requested {} tool calls", decision.invocations.len());
        Ok(decision)
    }

    async fn summarize(&self, history: &[ChatMessage]) -> Result<FeasibilityResponse> {
        let message = self
            .chat(&self.request(history, Vec::new(), Some(feasibility_schema())))
            .await?;

        Ok(parse_feasibility(&message.content))
    }
}
