//! Console rendering of answers and tool calls.
//!
//! Structured answers are printed section by section: answer text,
//! trials, sites, criteria and sources. Sections with nothing to show are
//! left out.

use crate::agent::tools::ToolCall;
use crate::agent::AgentReply;
use crate::models::{CriteriaExtract, FeasibilityResponse, SiteSummary, TrialSummary};
use anyhow::Result;
use serde_json::Value;

const RULE_WIDTH: usize = 50;

/// Render the agent's reply for the console.
pub fn render_reply(reply: &AgentReply) -> String {
    match reply {
        AgentReply::Text(text) => format!("\n📝 Answer:\n{}\n", text),
        AgentReply::Structured(response) => render_response(response),
    }
}

/// Render a structured answer.
pub fn render_response(response: &FeasibilityResponse) -> String {
    let mut output = String::new();

    output.push_str(&format!("\n📝 Answer:\n{}\n\n", response.answer));

    if let Some(ref trials) = response.trials {
        output.push_str(&render_trials_section(trials));
    }

    if let Some(ref sites) = response.sites {
        output.push_str(&render_sites_section(sites));
    }

    if let Some(ref criteria) = response.criteria {
        output.push_str(&render_criteria_section(criteria));
    }

    if !response.sources.is_empty() {
        output.push_str("📚 Sources:\n");
        for source in &response.sources {
            output.push_str(&format!("  • {}\n", source));
        }
    }

    output
}

fn render_trials_section(trials: &[TrialSummary]) -> String {
    if trials.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("🔬 Trials:\n");

    for trial in trials {
        section.push_str(&render_trial(trial));
    }
    section.push('\n');

    section
}

/// One trial: header line, then optional detail and date lines.
fn render_trial(trial: &TrialSummary) -> String {
    let mut block = format!("  • **{}** - {}\n", trial.nct_id, trial.title);

    let mut details = Vec::new();
    if let Some(ref phase) = trial.phase {
        details.push(format!("Phase: {}", phase));
    }
    if let Some(ref status) = trial.status {
        details.push(format!("Status: {}", status));
    }
    if let Some(ref sponsor) = trial.sponsor {
        details.push(format!("Sponsor: {}", sponsor));
    }
    // zero enrollment is not shown
    if let Some(enrollment) = trial.enrollment.filter(|n| *n > 0) {
        details.push(format!("Enrollment: {}", enrollment));
    }
    if !details.is_empty() {
        block.push_str(&format!("    {}\n", details.join(" | ")));
    }

    let mut dates = Vec::new();
    if let Some(ref start) = trial.start_date {
        dates.push(format!("Start: {}", start));
    }
    if let Some(ref completion) = trial.completion_date {
        dates.push(format!("Completion: {}", completion));
    }
    if !dates.is_empty() {
        block.push_str(&format!("    {}\n", dates.join(" | ")));
    }

    block
}

fn render_sites_section(sites: &[SiteSummary]) -> String {
    if sites.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("🏥 Sites:\n");

    for site in sites {
        let location: Vec<&str> = [site.city.as_deref(), site.country.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        section.push_str(&format!(
            "  • {} ({}) - {}\n",
            site.facility,
            location.join(", "),
            site.nct_id
        ));
    }
    section.push('\n');

    section
}

fn render_criteria_section(criteria: &CriteriaExtract) -> String {
    let mut section = String::new();

    section.push_str("✅ Inclusion Criteria:\n");
    for item in &criteria.inclusion {
        section.push_str(&format!("  • {}\n", item));
    }

    section.push_str("\n❌ Exclusion Criteria:\n");
    for item in &criteria.exclusion {
        section.push_str(&format!("  • {}\n", item));
    }
    section.push('\n');

    section
}

/// Render a tool call and its parameters.
pub fn render_tool_call(call: &ToolCall) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut block = String::new();

    block.push_str(&format!("\n{}\n", rule));
    block.push_str(&format!("🔧 TOOL CALL: {}\n", call.function.name));
    block.push_str(&format!("{}\n", rule));
    block.push_str("📥 Parameters:\n");

    match call.arguments() {
        Ok(Value::Object(params)) => {
            for (key, value) in &params {
                let shown = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                block.push_str(&format!("   • {}: {}\n", key, shown));
            }
        }
        Ok(_) => {}
        Err(_) => {
            block.push_str(&format!("   • (unparsed) {}\n", call.function.arguments));
        }
    }

    block
}

/// Render the reply as pretty JSON.
pub fn generate_json_reply(reply: &AgentReply) -> Result<String> {
    serde_json::to_string_pretty(reply).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_response() -> FeasibilityResponse {
        FeasibilityResponse {
            answer: "Found 2 Phase 3 diabetes trials in France".to_string(),
            trials: Some(vec![
                TrialSummary {
                    nct_id: "NCT01".to_string(),
                    title: "Insulin Study".to_string(),
                    phase: Some("PHASE3".to_string()),
                    status: Some("RECRUITING".to_string()),
                    sponsor: None,
                    enrollment: Some(120),
                    start_date: Some("2022-01".to_string()),
                    completion_date: None,
                },
                TrialSummary {
                    nct_id: "NCT02".to_string(),
                    title: "Diet Study".to_string(),
                    phase: None,
                    status: None,
                    sponsor: None,
                    enrollment: Some(0),
                    start_date: None,
                    completion_date: None,
                },
            ]),
            sites: Some(vec![SiteSummary {
                nct_id: "NCT01".to_string(),
                facility: "Hôpital Necker".to_string(),
                city: Some("Paris".to_string()),
                country: Some("France".to_string()),
            }]),
            criteria: Some(CriteriaExtract {
                inclusion: vec!["Adults".to_string()],
                exclusion: vec!["Pregnancy".to_string()],
            }),
            sources: vec!["NCT01".to_string(), "NCT02".to_string()],
        }
    }

    #[test]
    fn test_render_response_sections() {
        let output = render_response(&create_test_response());

        assert!(output.contains("Found 2 Phase 3 diabetes trials in France"));
        assert!(output.contains("**NCT01** - Insulin Study"));
        assert!(output.contains("Phase: PHASE3 | Status: RECRUITING | Enrollment: 120"));
        assert!(output.contains("Start: 2022-01\n"));
        assert!(output.contains("Hôpital Necker (Paris, France) - NCT01"));
        assert!(output.contains("  • Adults"));
        assert!(output.contains("  • Pregnancy"));
        assert!(output.contains("📚 Sources:\n  • NCT01\n  • NCT02"));
    }

    #[test]
    fn test_trial_without_details() {
        let output = render_trial(&TrialSummary {
            nct_id: "NCT02".to_string(),
            title: "Diet Study".to_string(),
            phase: None,
            status: None,
            sponsor: None,
            enrollment: Some(0),
            start_date: None,
            completion_date: None,
        });

        assert_eq!(output, "  • **NCT02** - Diet Study\n");
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let response = FeasibilityResponse {
            answer: "No trials matched.".to_string(),
            trials: Some(vec![]),
            sites: None,
            criteria: None,
            sources: vec![],
        };

        let output = render_response(&response);

        assert!(!output.contains("Trials:"));
        assert!(!output.contains("Sites:"));
        assert!(!output.contains("Sources:"));
    }

    #[test]
    fn test_render_text_reply() {
        let output = render_reply(&AgentReply::Text("Hello there".to_string()));
        assert!(output.contains("Answer:\nHello there"));
    }

    #[test]
    fn test_render_tool_call() {
        let call = ToolCall::new("search_trials", json!({"condition": "asthma", "max_results": 5}));
        let output = render_tool_call(&call);

        assert!(output.contains("TOOL CALL: search_trials"));
        assert!(output.contains("   • condition: asthma"));
        assert!(output.contains("   • max_results: 5"));

        let broken = ToolCall::new("count_trials", json!("{\"condition\": "));
        assert!(render_tool_call(&broken).contains("   • (unparsed) "));
    }

    #[test]
    fn test_generate_json_reply() {
        let reply = AgentReply::Structured(create_test_response());
        let json = generate_json_reply(&reply).unwrap();

        assert!(json.contains("\"answer\""));
        assert!(json.contains("\"sources\""));

        let text = generate_json_reply(&AgentReply::Text("hi".to_string())).unwrap();
        assert_eq!(text, "\"hi\"");
    }
}
