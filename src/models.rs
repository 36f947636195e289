//! Data models for trial records and tool payloads.
//!
//! This module contains the normalized record shapes produced by the
//! registry client, the derived payloads produced by the aggregator, and
//! the structured answer returned to the user.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Single-key error payload handed to the oracle in place of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl From<crate::registry::RegistryError> for ErrorPayload {
    fn from(e: crate::registry::RegistryError) -> Self {
        Self::new(e.to_string())
    }
}

/// An intervention (drug, device, procedure...) studied by a trial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Intervention {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
}

/// Planned or actual enrollment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Enrollment {
    pub count: u64,
    /// `ACTUAL` or `ESTIMATED` as reported by the registry.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Key dates of a trial, as ISO-partial strings (`2020`, `2020-01`, `2020-01-15`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrialDates {
    pub start: String,
    pub start_type: String,
    pub completion: String,
    pub completion_type: String,
    pub primary_completion: String,
    pub first_posted: String,
    pub last_updated: String,
    pub first_submit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Eligibility {
    /// Free-text criteria blob, usually with "Inclusion Criteria" and
    /// "Exclusion Criteria" headings.
    pub criteria: String,
    pub sex: String,
    pub min_age: String,
    pub max_age: String,
    pub std_ages: Vec<String>,
    pub healthy_volunteers: bool,
}

/// A trial location as kept on the normalized record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialLocation {
    pub facility: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudyDesign {
    pub allocation: String,
    pub intervention_model: String,
    pub primary_purpose: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrimaryOutcome {
    pub measure: String,
    pub description: String,
    pub time_frame: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecondaryOutcome {
    pub measure: String,
    pub time_frame: String,
}

/// Extra fields carried only by the full-detail view of a trial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialDetails {
    pub official_title: String,
    pub organization: String,
    pub investigator: String,
    pub investigator_affiliation: String,
    pub brief_summary: String,
    pub detailed_description: String,
    pub design: StudyDesign,
    pub primary_outcomes: Vec<PrimaryOutcome>,
    pub secondary_outcomes: Vec<SecondaryOutcome>,
}

/// A normalized trial record.
///
/// Every string defaults to `""` and every list to `[]`, so a record is
/// always fully populated regardless of what the registry returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrialRecord {
    pub nct_id: String,
    pub title: String,
    pub acronym: String,
    pub status: String,
    pub phases: Vec<String>,
    pub study_type: String,
    pub conditions: Vec<String>,
    pub interventions: Vec<Intervention>,
    pub sponsor: String,
    pub sponsor_class: String,
    pub enrollment: Enrollment,
    pub dates: TrialDates,
    pub eligibility: Eligibility,
    pub locations: Vec<TrialLocation>,
    /// Present only on the full-detail view.
    #[serde(flatten)]
    pub details: Option<TrialDetails>,
}

impl TrialRecord {
    /// Whether this record carries the full-detail fields.
    pub fn is_full(&self) -> bool {
        self.details.is_some()
    }
}

/// Geographic coordinates of a site, when the registry has them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

/// One trial location, flattened out of its trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRecord {
    pub nct_id: String,
    pub facility: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub status: String,
    pub geo_point: GeoPoint,
}

/// Result of a bounded trial count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResult {
    pub count: usize,
    pub is_exact: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CountResult {
    pub fn exact(count: usize) -> Self {
        Self {
            count,
            is_exact: true,
            note: None,
        }
    }

    pub fn at_least(count: usize) -> Self {
        Self {
            count,
            is_exact: false,
            note: Some(format!("At least {} trials", count)),
        }
    }
}

/// Inclusion and exclusion fragments, one per source trial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaExtract {
    #[serde(default)]
    pub inclusion: Vec<String>,
    #[serde(default)]
    pub exclusion: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentStats {
    pub total: u64,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub total_days: i64,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_days: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_months: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_years: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_days: Option<i64>,
}

/// Statistics derived from one bounded page of trials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsBundle {
    pub total_trials: usize,
    pub trial_nct_ids: Vec<String>,
    pub phases: BTreeMap<String, usize>,
    pub statuses: BTreeMap<String, usize>,
    #[serde(rename = "studyTypes")]
    pub study_types: BTreeMap<String, usize>,
    pub sponsors: BTreeMap<String, usize>,
    pub enrollment: EnrollmentStats,
    pub duration: DurationStats,
}

/// A trial as listed in the final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    pub nct_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<String>,
}

/// A site as listed in the final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSummary {
    pub nct_id: String,
    pub facility: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// The structured answer produced by the oracle from tool results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityResponse {
    /// Brief intro text; details belong in the structured fields.
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trials: Option<Vec<TrialSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sites: Option<Vec<SiteSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<CriteriaExtract>,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_payload_shape() {
        let value = serde_json::to_value(ErrorPayload::new("boom")).unwrap();
        assert_eq!(value, json!({"error": "boom"}));
    }

    #[test]
    fn test_count_result_note() {
        let exact = serde_json::to_value(CountResult::exact(42)).unwrap();
        assert_eq!(exact, json!({"count": 42, "is_exact": true}));

        let partial = CountResult::at_least(300);
        assert!(!partial.is_exact);
        assert_eq!(partial.note.as_deref(), Some("At least 300 trials"));
    }

    #[test]
    fn test_compact_record_has_no_detail_keys() {
        let record = TrialRecord {
            nct_id: "NCT00000001".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["nctId"], "NCT00000001");
        assert_eq!(value["phases"], json!([]));
        assert_eq!(value["eligibility"]["healthyVolunteers"], false);
        assert!(value.get("officialTitle").is_none());
        assert!(value.get("primaryOutcomes").is_none());
    }

    #[test]
    fn test_full_record_flattens_details() {
        let record = TrialRecord {
            details: Some(TrialDetails {
                official_title: "A Long Official Title".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["officialTitle"], "A Long Official Title");
        assert_eq!(value["design"]["allocation"], "");
        assert!(record.is_full());
    }

    #[test]
    fn test_record_decodes_from_sparse_json() {
        let record: TrialRecord = serde_json::from_value(json!({
            "nctId": "NCT1",
            "eligibility": {"criteria": "Inclusion Criteria: adults"}
        }))
        .unwrap();

        assert_eq!(record.nct_id, "NCT1");
        assert_eq!(record.eligibility.criteria, "Inclusion Criteria: adults");
        assert!(record.locations.is_empty());
    }

    #[test]
    fn test_statistics_bundle_omits_empty_averages() {
        let value = serde_json::to_value(StatisticsBundle::default()).unwrap();
        assert_eq!(value["duration"], json!({"total_days": 0, "count": 0}));
        assert_eq!(value["enrollment"], json!({"total": 0, "count": 0}));
        assert!(value.get("studyTypes").is_some());
    }

    #[test]
    fn test_feasibility_response_optional_fields() {
        let response: FeasibilityResponse = serde_json::from_value(json!({
            "answer": "Found 2 trials",
            "sources": ["NCT1", "NCT2"]
        }))
        .unwrap();

        assert!(response.trials.is_none());
        assert!(response.criteria.is_none());
        assert_eq!(response.sources.len(), 2);
    }
}
