//! Normalization of raw registry studies into [`TrialRecord`]s.

use crate::models::{
    Eligibility, Enrollment, GeoPoint, Intervention, PrimaryOutcome, SecondaryOutcome, SiteRecord,
    StudyDesign, TrialDates, TrialDetails, TrialLocation, TrialRecord,
};
use crate::registry::raw::{RawLocation, RawStudy};

/// Criteria blobs are cut to this many characters in the compact view.
pub const COMPACT_CRITERIA_CHARS: usize = 800;

/// Intervention descriptions are cut to this many characters in the compact view.
pub const COMPACT_DESCRIPTION_CHARS: usize = 200;

/// Locations kept on a normalized record.
pub const MAX_RECORD_LOCATIONS: usize = 10;

/// Which view of a study to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyView {
    /// Truncated free text, no extended fields. Used for listings.
    Compact,
    /// Untruncated, with outcomes, descriptions and design.
    Full,
}

/// Keep at most `max_chars` characters of `s`.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Build a normalized record from a raw study.
///
/// Total over any decodable study: missing modules have already been
/// defaulted by the raw types.
pub fn parse_study(study: &RawStudy, view: StudyView) -> TrialRecord {
    let p = &study.protocol_section;
    let id = &p.identification_module;
    let status = &p.status_module;
    let design = &p.design_module;
    let eligibility = &p.eligibility_module;
    let full = view == StudyView::Full;

    let interventions = p
        .arms_interventions_module
        .interventions
        .iter()
        .map(|i| Intervention {
            kind: i.kind.clone(),
            name: i.name.clone(),
            description: if full {
                i.description.clone()
            } else {
                truncate_chars(&i.description, COMPACT_DESCRIPTION_CHARS)
            },
        })
        .collect();

    let locations = p
        .contacts_locations_module
        .locations
        .iter()
        .take(MAX_RECORD_LOCATIONS)
        .map(|loc| TrialLocation {
            facility: loc.facility.clone().unwrap_or_default(),
            city: loc.city.clone(),
            state: loc.state.clone(),
            country: loc.country.clone(),
            status: loc.status.clone(),
        })
        .collect();

    let criteria = if full {
        eligibility.eligibility_criteria.clone()
    } else {
        truncate_chars(&eligibility.eligibility_criteria, COMPACT_CRITERIA_CHARS)
    };

    let details = full.then(|| {
        let sponsor = &p.sponsor_collaborators_module;
        let outcomes = &p.outcomes_module;
        TrialDetails {
            official_title: id.official_title.clone(),
            organization: id.organization.full_name.clone(),
            investigator: sponsor.responsible_party.investigator_full_name.clone(),
            investigator_affiliation: sponsor.responsible_party.investigator_affiliation.clone(),
            brief_summary: p.description_module.brief_summary.clone(),
            detailed_description: p.description_module.detailed_description.clone(),
            design: StudyDesign {
                allocation: design.design_info.allocation.clone(),
                intervention_model: design.design_info.intervention_model.clone(),
                primary_purpose: design.design_info.primary_purpose.clone(),
            },
            primary_outcomes: outcomes
                .primary_outcomes
                .iter()
                .map(|o| PrimaryOutcome {
                    measure: o.measure.clone(),
                    description: o.description.clone(),
                    time_frame: o.time_frame.clone(),
                })
                .collect(),
            secondary_outcomes: outcomes
                .secondary_outcomes
                .iter()
                .map(|o| SecondaryOutcome {
                    measure: o.measure.clone(),
                    time_frame: o.time_frame.clone(),
                })
                .collect(),
        }
    });

    TrialRecord {
        nct_id: id.nct_id.clone(),
        title: id.brief_title.clone(),
        acronym: id.acronym.clone(),
        status: status.overall_status.clone(),
        phases: design.phases.clone(),
        study_type: design.study_type.clone(),
        conditions: p.conditions_module.conditions.clone(),
        interventions,
        sponsor: p.sponsor_collaborators_module.lead_sponsor.name.clone(),
        sponsor_class: p.sponsor_collaborators_module.lead_sponsor.class.clone(),
        enrollment: Enrollment {
            count: design.enrollment_info.count.unwrap_or(0),
            kind: design.enrollment_info.kind.clone(),
        },
        dates: TrialDates {
            start: status.start_date_struct.date.clone(),
            start_type: status.start_date_struct.kind.clone(),
            completion: status.completion_date_struct.date.clone(),
            completion_type: status.completion_date_struct.kind.clone(),
            primary_completion: status.primary_completion_date_struct.date.clone(),
            first_posted: status.study_first_post_date_struct.date.clone(),
            last_updated: status.last_update_post_date_struct.date.clone(),
            first_submit: status.study_first_submit_date.clone(),
        },
        eligibility: Eligibility {
            criteria,
            sex: eligibility.sex.clone(),
            min_age: eligibility.minimum_age.clone(),
            max_age: eligibility.maximum_age.clone(),
            std_ages: eligibility.std_ages.clone(),
            healthy_volunteers: eligibility.healthy_volunteers,
        },
        locations,
        details,
    }
}

fn site_from_location(nct_id: &str, loc: &RawLocation) -> SiteRecord {
    SiteRecord {
        nct_id: nct_id.to_string(),
        facility: loc
            .facility
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        city: loc.city.clone(),
        state: loc.state.clone(),
        country: loc.country.clone(),
        status: loc.status.clone(),
        geo_point: loc
            .geo_point
            .map(|g| GeoPoint {
                lat: g.lat,
                lon: g.lon,
            })
            .unwrap_or_default(),
    }
}

/// Flatten every location of every study into site records, stopping once
/// `limit` sites have been collected.
pub fn flatten_sites(studies: &[RawStudy], limit: usize) -> Vec<SiteRecord> {
    studies
        .iter()
        .flat_map(|study| {
            let nct_id = study.protocol_section.identification_module.nct_id.as_str();
            study
                .protocol_section
                .contacts_locations_module
                .locations
                .iter()
                .map(move |loc| site_from_location(nct_id, loc))
        })
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::{study, study_with_locations};
    use serde_json::json;

    #[test]
    fn test_missing_modules_resolve_to_defaults() {
        let raw: RawStudy = serde_json::from_value(json!({"protocolSection": {}})).unwrap();
        let record = parse_study(&raw, StudyView::Compact);

        assert_eq!(record, TrialRecord::default());
    }

    #[test]
    fn test_compact_view_truncates_free_text() {
        let raw = study(json!({
            "identificationModule": {"nctId": "NCT1", "officialTitle": "Official"},
            "eligibilityModule": {"eligibilityCriteria": "x".repeat(2000)},
            "armsInterventionsModule": {"interventions": [
                {"type": "DRUG", "name": "Insulin", "description": "d".repeat(500)}
            ]}
        }));

        let record = parse_study(&raw, StudyView::Compact);

        assert_eq!(record.eligibility.criteria.chars().count(), 800);
        assert_eq!(record.interventions[0].description.chars().count(), 200);
        assert_eq!(record.interventions[0].kind, "DRUG");
        assert!(record.details.is_none());
    }

    #[test]
    fn test_full_view_keeps_everything() {
        let raw = study(json!({
            "identificationModule": {
                "nctId": "NCT1",
                "officialTitle": "Official",
                "organization": {"fullName": "Org"}
            },
            "descriptionModule": {"briefSummary": "Summary"},
            "designModule": {"designInfo": {"allocation": "RANDOMIZED"}},
            "eligibilityModule": {"eligibilityCriteria": "x".repeat(2000)},
            "outcomesModule": {
                "primaryOutcomes": [{"measure": "HbA1c", "description": "change", "timeFrame": "12 weeks"}],
                "secondaryOutcomes": [{"measure": "Weight", "description": "ignored", "timeFrame": "24 weeks"}]
            }
        }));

        let record = parse_study(&raw, StudyView::Full);
        let details = record.details.as_ref().unwrap();

        assert_eq!(record.eligibility.criteria.len(), 2000);
        assert_eq!(details.official_title, "Official");
        assert_eq!(details.organization, "Org");
        assert_eq!(details.design.allocation, "RANDOMIZED");
        assert_eq!(details.primary_outcomes[0].time_frame, "12 weeks");
        assert_eq!(details.secondary_outcomes[0].measure, "Weight");
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let text = "é".repeat(900);
        assert_eq!(truncate_chars(&text, 800).chars().count(), 800);
        assert_eq!(truncate_chars("short", 800), "short");
    }

    #[test]
    fn test_record_keeps_at_most_ten_locations() {
        let raw = study_with_locations("NCT1", 15);
        let record = parse_study(&raw, StudyView::Compact);
        assert_eq!(record.locations.len(), 10);
    }

    #[test]
    fn test_dates_and_enrollment() {
        let raw = study(json!({
            "statusModule": {
                "overallStatus": "COMPLETED",
                "startDateStruct": {"date": "2020-01", "type": "ACTUAL"},
                "completionDateStruct": {"date": "2021-06-30", "type": "ACTUAL"},
                "studyFirstSubmitDate": "2019-11-02"
            },
            "designModule": {
                "phases": ["PHASE2", "PHASE3"],
                "enrollmentInfo": {"count": 120, "type": "ACTUAL"}
            }
        }));

        let record = parse_study(&raw, StudyView::Compact);

        assert_eq!(record.status, "COMPLETED");
        assert_eq!(record.phases, vec!["PHASE2", "PHASE3"]);
        assert_eq!(record.enrollment.count, 120);
        assert_eq!(record.dates.start, "2020-01");
        assert_eq!(record.dates.completion_type, "ACTUAL");
        assert_eq!(record.dates.first_submit, "2019-11-02");
    }

    #[test]
    fn test_site_defaults() {
        let raw = study(json!({
            "identificationModule": {"nctId": "NCT9"},
            "contactsLocationsModule": {"locations": [
                {"city": "Madrid", "country": "Spain"},
                {"facility": "Hospital Clinic", "geoPoint": {"lat": 41.38, "lon": 2.15}}
            ]}
        }));

        let sites = flatten_sites(std::slice::from_ref(&raw), 50);

        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].facility, "Unknown");
        assert_eq!(sites[0].nct_id, "NCT9");
        assert_eq!(serde_json::to_value(sites[0].geo_point).unwrap(), json!({}));
        assert_eq!(sites[1].geo_point.lat, Some(41.38));
    }

    #[test]
    fn test_flatten_sites_stops_mid_study() {
        let studies = vec![
            study_with_locations("NCT1", 30),
            study_with_locations("NCT2", 30),
        ];

        let sites = flatten_sites(&studies, 50);

        assert_eq!(sites.len(), 50);
        assert_eq!(sites.iter().filter(|s| s.nct_id == "NCT2").count(), 20);
    }
}
