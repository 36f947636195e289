//! Tool definitions for the clinical trials agent.
//!
//! This module declares the six operations the oracle may call and
//! dispatches each call to the registry client or the aggregator. Every
//! result is a JSON success payload or a single-key `{"error": ...}`.

use crate::analysis::{analyze_criteria, decode_trials, summarize_trials};
use crate::models::ErrorPayload;
use crate::registry::{FilterField, QueryFilter, RegistryClient, RegistryTransport};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

/// Tool definition for the chat tool-calling API.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A tool call made by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }

    /// Arguments as an object. Some models send them as a JSON string.
    pub fn arguments(&self) -> Result<Value, ErrorPayload> {
        let value = match &self.function.arguments {
            Value::String(s) => serde_json::from_str(s)
                .map_err(|e| ErrorPayload::new(format!("Invalid tool arguments: {}", e)))?,
            Value::Null => return Ok(json!({})),
            other => other.clone(),
        };

        match value {
            Value::Object(_) => Ok(value),
            Value::Null => Ok(json!({})),
            other => Err(ErrorPayload::new(format!(
                "Invalid tool arguments: expected a JSON object, got {}",
                other
            ))),
        }
    }
}

const COUNT_FIELDS: [FilterField; 4] = [
    FilterField::Condition,
    FilterField::Phase,
    FilterField::Status,
    FilterField::Location,
];

const STATISTICS_FIELDS: [FilterField; 5] = [
    FilterField::Condition,
    FilterField::Phase,
    FilterField::Status,
    FilterField::Location,
    FilterField::Sponsor,
];

const SITES_FIELDS: [FilterField; 4] = COUNT_FIELDS;

pub const DEFAULT_SEARCH_RESULTS: i64 = 10;
pub const DEFAULT_STATISTICS_RESULTS: i64 = 20;
pub const DEFAULT_SITES_RESULTS: i64 = 10;

/// Serialize an operation result into its tool payload.
fn to_payload<T: Serialize>(result: Result<T, ErrorPayload>) -> Value {
    let value = match result {
        Ok(payload) => serde_json::to_value(payload)
            .map_err(|e| ErrorPayload::new(format!("Failed to encode result: {}", e))),
        Err(error) => Err(error),
    };

    value.unwrap_or_else(|error| {
        warn!("Tool returned error: {}", error);
        json!({ "error": error.error })
    })
}

fn max_results_arg(args: &Value, default: i64) -> i64 {
    match args.get("max_results") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Dispatches tool calls to the core operations.
pub struct ToolExecutor<T: RegistryTransport> {
    client: RegistryClient<T>,
}

impl<T: RegistryTransport> ToolExecutor<T> {
    pub fn new(client: RegistryClient<T>) -> Self {
        Self { client }
    }

    /// Execute a tool call and return its JSON result.
    pub async fn execute(&self, tool_call: &ToolCall) -> Value {
        let name = tool_call.function.name.as_str();
        let args = match tool_call.arguments() {
            Ok(args) => args,
            Err(error) => return to_payload::<()>(Err(error)),
        };

        debug!("Executing tool: {} with args: {}", name, args);

        let result = match name {
            "count_trials" => self.count_trials(&args).await,
            "show_trials" => self.show_trials(&args).await,
            "search_trials" => self.search_trials(&args).await,
            "analyze_criteria" => self.analyze_criteria(&args),
            "calculate_statistics" => self.calculate_statistics(&args).await,
            "extract_sites" => self.extract_sites(&args).await,
            _ => to_payload::<()>(Err(ErrorPayload::new(format!("Unknown tool: {}", name)))),
        };

        info!("Tool {} executed", name);
        result
    }

    async fn count_trials(&self, args: &Value) -> Value {
        let filter = QueryFilter::from_args(args, &COUNT_FIELDS);
        to_payload(self.client.count(&filter).await.map_err(ErrorPayload::from))
    }

    async fn show_trials(&self, args: &Value) -> Value {
        let nct_id = match args.get("nctId").and_then(|v| v.as_str()) {
            Some(id) if !id.trim().is_empty() => id.trim(),
            _ => {
                return to_payload::<()>(Err(ErrorPayload::new(
                    "Missing required parameter: nctId",
                )))
            }
        };

        to_payload(self.client.show(nct_id).await.map_err(ErrorPayload::from))
    }

    async fn search_trials(&self, args: &Value) -> Value {
        let filter = QueryFilter::from_args(args, &FilterField::ALL);
        let max_results = max_results_arg(args, DEFAULT_SEARCH_RESULTS);
        to_payload(
            self.client
                .search(&filter, max_results)
                .await
                .map_err(ErrorPayload::from),
        )
    }

    fn analyze_criteria(&self, args: &Value) -> Value {
        let Some(trials) = args.get("trials") else {
            return to_payload::<()>(Err(ErrorPayload::new(
                "Missing required parameter: trials",
            )));
        };

        let result = decode_trials(trials).and_then(|decoded| {
            if decoded.skipped > 0 {
                debug!("Skipped {} malformed trial records", decoded.skipped);
            }
            analyze_criteria(Ok(decoded.records.as_slice()))
        });

        to_payload(result)
    }

    async fn calculate_statistics(&self, args: &Value) -> Value {
        let filter = QueryFilter::from_args(args, &STATISTICS_FIELDS);
        let max_results = max_results_arg(args, DEFAULT_STATISTICS_RESULTS);

        let result = self
            .client
            .search(&filter, max_results)
            .await
            .map_err(ErrorPayload::from)
            .map(|records| summarize_trials(&records));

        to_payload(result)
    }

    async fn extract_sites(&self, args: &Value) -> Value {
        let filter = QueryFilter::from_args(args, &SITES_FIELDS);
        let max_results = max_results_arg(args, DEFAULT_SITES_RESULTS);
        to_payload(
            self.client
                .extract_sites(&filter, max_results)
                .await
                .map_err(ErrorPayload::from),
        )
    }
}

/// JSON-schema parameters for a set of filter fields plus extras.
fn filter_parameters(fields: &[FilterField], extra: Value, required: &[&str]) -> Value {
    let mut properties = Map::new();

    for field in fields {
        properties.insert(
            field.arg_name().to_string(),
            json!({"type": "string", "description": field.description()}),
        );
    }

    if let Value::Object(extra) = extra {
        properties.extend(extra);
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

fn function(name: &str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        },
    }
}

/// The operation catalog handed to the oracle.
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        function(
            "count_trials",
            "Count the NUMBER OF TRIALS matching criteria. Use ONLY for 'how many trials exist' questions. Does NOT return patient/enrollment numbers or trial details.",
            filter_parameters(&COUNT_FIELDS, json!({}), &[]),
        ),
        function(
            "show_trials",
            "Show full details for a specific trial by NCT ID. Use when user asks about a specific trial.",
            filter_parameters(
                &[],
                json!({"nctId": {"type": "string", "description": "NCT ID (e.g., 'NCT03264352')"}}),
                &["nctId"],
            ),
        ),
        function(
            "search_trials",
            "Search for trials and get details including: title, phase, status, sponsor, ENROLLMENT/PATIENT COUNTS, dates, eligibility, locations. Use this for questions about patient numbers, enrollment sizes, or listing trials.",
            filter_parameters(
                &FilterField::ALL,
                json!({"max_results": {
                    "type": "integer",
                    "description": "Maximum results (default: 10, max: 20)",
                    "default": DEFAULT_SEARCH_RESULTS
                }}),
                &[],
            ),
        ),
        function(
            "analyze_criteria",
            "Extract and analyze eligibility criteria patterns (inclusion/exclusion) from trial data. Use after search_trials.",
            filter_parameters(
                &[],
                json!({"trials": {"type": "string", "description": "JSON string of trial data from search_trials"}}),
                &["trials"],
            ),
        ),
        function(
            "calculate_statistics",
            "Calculate statistics from trials: phase distribution, status counts, sponsor breakdown, AVERAGE ENROLLMENT/PATIENT NUMBERS, and AVERAGE TRIAL DURATION (in days/months/years). Makes its own API call. Use for questions about patient numbers, trial duration, or summary statistics.",
            filter_parameters(
                &STATISTICS_FIELDS,
                json!({"max_results": {
                    "type": "integer",
                    "description": "Max trials to analyze (default: 20)",
                    "default": DEFAULT_STATISTICS_RESULTS
                }}),
                &[],
            ),
        ),
        function(
            "extract_sites",
            "Extract site/facility information from trials. Makes its own API call.",
            filter_parameters(
                &SITES_FIELDS,
                json!({"max_results": {
                    "type": "integer",
                    "description": "Max trials to check (default: 10, max: 20)",
                    "default": DEFAULT_SITES_RESULTS
                }}),
                &[],
            ),
        ),
    ]
}
