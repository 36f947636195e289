//! Agent loop for answering clinical trial questions.
//!
//! Each question is one round: the oracle either replies directly or
//! requests operations; the operations run in order against the registry
//! and their results go back to the oracle, which writes a structured
//! answer. The history persists across questions until cleared.

use crate::agent::oracle::{ChatMessage, ReasoningOracle};
use crate::agent::tools::{get_tool_definitions, ToolCall, ToolDefinition, ToolExecutor};
use crate::models::FeasibilityResponse;
use crate::registry::RegistryTransport;
use crate::session::SessionLogger;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Configuration for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Messages kept after the system prompt (sliding window)
    pub max_context_messages: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_context_messages: 40,
        }
    }
}

/// The agent's answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AgentReply {
    /// The oracle answered without calling any operation.
    Text(String),
    Structured(FeasibilityResponse),
}

/// An operation run during a turn, with its result.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedTool {
    pub call: ToolCall,
    pub result: Value,
}

/// Outcome of [`TrialsAgent::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct AgentTurn {
    pub reply: AgentReply,
    pub tool_calls: Vec<ExecutedTool>,
}

/// The clinical trials agent.
pub struct TrialsAgent<O: ReasoningOracle, T: RegistryTransport> {
    config: AgentConfig,
    oracle: O,
    tool_executor: ToolExecutor<T>,
    catalog: Vec<ToolDefinition>,
    messages: Vec<ChatMessage>,
    session: Option<SessionLogger>,
}

impl<O: ReasoningOracle, T: RegistryTransport> TrialsAgent<O, T> {
    pub fn new(config: AgentConfig, oracle: O, tool_executor: ToolExecutor<T>) -> Self {
        Self {
            config,
            oracle,
            tool_executor,
            catalog: get_tool_definitions(),
            messages: vec![ChatMessage::system(AGENT_SYSTEM_PROMPT)],
            session: None,
        }
    }

    /// Record the conversation to `session`.
    pub fn with_session(mut self, session: SessionLogger) -> Self {
        self.session = Some(session);
        self
    }

    pub fn session(&self) -> Option<&SessionLogger> {
        self.session.as_ref()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Drop the conversation, keeping only the system prompt.
    pub fn clear_memory(&mut self) {
        self.messages.truncate(1);
        info!("Conversation memory cleared");
        self.log_session(|s| s.log_memory_cleared());
    }

    /// Answer one question.
    pub async fn run(&mut self, question: &str) -> Result<AgentTurn> {
        match self.run_turn(question).await {
            Ok(turn) => Ok(turn),
            Err(e) => {
                let message = format!("{:#}", e);
                self.log_session(|s| s.log_error("AgentError", &message));
                Err(e)
            }
        }
    }

    async fn run_turn(&mut self, question: &str) -> Result<AgentTurn> {
        self.prune_old_messages();

        self.log_session(|s| s.log_user_message(question));
        self.messages.push(ChatMessage::user(question));

        let decision = self
            .oracle
            .decide(&self.messages, &self.catalog)
            .await
            .context("Oracle failed to choose an action")?;

        if decision.invocations.is_empty() {
            debug!("Oracle replied without tool calls");
            self.messages.push(ChatMessage::assistant(decision.content.clone()));
            self.log_session(|s| s.log_assistant_response(Value::String(decision.content.clone())));

            return Ok(AgentTurn {
                reply: AgentReply::Text(decision.content),
                tool_calls: Vec::new(),
            });
        }

        self.messages.push(ChatMessage::assistant_calls(
            decision.content,
            decision.invocations.clone(),
        ));

        let mut executed = Vec::with_capacity(decision.invocations.len());
        for call in decision.invocations {
            let result = self.tool_executor.execute(&call).await;

            let arguments = call
                .arguments()
                .unwrap_or_else(|_| call.function.arguments.clone());
            self.log_session(|s| s.log_tool_call(&call.function.name, &arguments, &result));
            self.messages
                .push(ChatMessage::tool(call.function.name.clone(), result.to_string()));

            executed.push(ExecutedTool { call, result });
        }
        info!("Executed {} tool calls", executed.len());

        let response = self
            .oracle
            .summarize(&self.messages)
            .await
            .context("Oracle failed to summarize tool results")?;

        self.messages.push(ChatMessage::assistant(response.answer.clone()));
        match serde_json::to_value(&response) {
            Ok(content) => self.log_session(|s| s.log_assistant_response(content)),
            Err(e) => warn!("Failed to encode response for session log: {}", e),
        }

        Ok(AgentTurn {
            reply: AgentReply::Structured(response),
            tool_calls: executed,
        })
    }

    /// Sliding window: keep the system prompt and the newest messages.
    fn prune_old_messages(&mut self) {
        let max_keep = self.config.max_context_messages + 1;

        if self.messages.len() > max_keep {
            let mut remove_count = self.messages.len() - max_keep;

            // tool results must not outlive the call that produced them
            while self
                .messages
                .get(1 + remove_count)
                .is_some_and(|m| m.role == "tool")
            {
                remove_count += 1;
            }

            self.messages.drain(1..1 + remove_count);
            debug!("Pruned {} old messages to save context", remove_count);
        }
    }

    fn log_session<F>(&mut self, f: F)
    where
        F: FnOnce(&mut SessionLogger) -> Result<()>,
    {
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = f(session) {
                warn!("Session log write failed: {:#}", e);
            }
        }
    }
}

/// System prompt for the agent
const AGENT_SYSTEM_PROMPT: &str = r#"You are a helpful clinical trial feasibility assistant. You help pharma companies plan trials by querying ClinicalTrials.gov and providing insights about trials, eligibility criteria, patient counts, and sites.

RESPONSE STRUCTURE:
- 'answer': Brief summary/intro text (e.g., "Found 5 Phase 3 diabetes trials in France")
- 'trials': Populate with trial details when listing trials (nct_id, title, phase, status, sponsor, enrollment, dates)
- 'sites': Populate with site details when listing facilities (nct_id, facility, city, country)
- 'criteria': Populate with inclusion/exclusion lists when asked about eligibility criteria
- 'sources': Always include NCT IDs of trials referenced

RULES:
1. Use structured fields (trials, sites, criteria) instead of putting details in the answer text
2. The 'answer' field should be a brief intro, not repeat what's in structured fields
3. Always populate 'sources' with NCT IDs
4. Include ALL items from tool results - never give incomplete data"#;
