//! Eligibility criteria extraction.
//!
//! Criteria blobs are split on the literal "Inclusion Criteria" and
//! "Exclusion Criteria" headings. Formatting variants of those headings
//! are not recognised.

use crate::models::{CriteriaExtract, ErrorPayload, TrialRecord};
use serde_json::Value;
use tracing::debug;

pub const INCLUSION_MARKER: &str = "Inclusion Criteria";
pub const EXCLUSION_MARKER: &str = "Exclusion Criteria";

/// Fragments found in a single criteria blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CriteriaSplit {
    pub inclusion: Option<String>,
    pub exclusion: Option<String>,
}

/// Text between the first occurrence of `marker` and the next one.
fn section_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let rest = text.split(marker).nth(1)?;
    Some(rest)
}

fn clean_fragment(fragment: &str) -> String {
    fragment.trim().trim_start_matches(':').trim().to_string()
}

/// Split one criteria blob into its inclusion and exclusion fragments.
pub fn split_criteria(text: &str) -> CriteriaSplit {
    let inclusion = section_after(text, INCLUSION_MARKER).map(|section| {
        let section = section.split(EXCLUSION_MARKER).next().unwrap_or(section);
        clean_fragment(section)
    });

    let exclusion = section_after(text, EXCLUSION_MARKER).map(clean_fragment);

    CriteriaSplit {
        inclusion,
        exclusion,
    }
}

/// Collect inclusion/exclusion fragments across trials.
///
/// An error input is handed back unchanged.
pub fn analyze_criteria(
    trials: Result<&[TrialRecord], ErrorPayload>,
) -> Result<CriteriaExtract, ErrorPayload> {
    let trials = trials?;

    let extract = trials
        .iter()
        .map(|t| t.eligibility.criteria.as_str())
        .filter(|text| !text.is_empty())
        .map(split_criteria)
        .fold(CriteriaExtract::default(), |mut acc, split| {
            acc.inclusion.extend(split.inclusion);
            acc.exclusion.extend(split.exclusion);
            acc
        });

    debug!(
        "Extracted {} inclusion and {} exclusion fragments from {} trials",
        extract.inclusion.len(),
        extract.exclusion.len(),
        trials.len()
    );

    Ok(extract)
}

/// Trials decoded from an oracle-supplied argument.
#[derive(Debug, Default)]
pub struct DecodedTrials {
    pub records: Vec<TrialRecord>,
    /// Elements that could not be read as a trial record.
    pub skipped: usize,
}

/// Decode the `trials` argument of `analyze_criteria`.
///
/// Accepts a JSON string or a JSON value. An `{"error": ...}` object is
/// returned as the error so it can pass straight through. Elements that
/// are not trial records are skipped and counted.
pub fn decode_trials(arg: &Value) -> Result<DecodedTrials, ErrorPayload> {
    let parsed;
    let value = match arg {
        Value::String(s) => {
            parsed = serde_json::from_str::<Value>(s)
                .map_err(|e| ErrorPayload::new(format!("Invalid trials JSON: {}", e)))?;
            &parsed
        }
        other => other,
    };

    if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
        return Err(ErrorPayload::new(error));
    }

    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        _ => return Err(ErrorPayload::new("trials must be a list of trial records")),
    };

    let mut decoded = DecodedTrials::default();
    for item in items {
        match serde_json::from_value::<TrialRecord>(item.clone()) {
            Ok(record) => decoded.records.push(record),
            Err(e) => {
                debug!("Skipping malformed trial record: {}", e);
                decoded.skipped += 1;
            }
        }
    }

    Ok(decoded)
}
