//! LLM agent modules for clinical trial questions.
//!
//! This module provides the tool catalog, the oracle boundary and the
//! conversational agent loop.

pub mod agent_loop;
pub mod oracle;
pub mod tools;

pub use agent_loop::{AgentConfig, AgentReply, TrialsAgent};
pub use oracle::{OllamaOracle, OracleConfig, ReasoningOracle};
pub use tools::ToolExecutor;
