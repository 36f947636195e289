//! Raw ClinicalTrials.gov v2 payload types.
//!
//! Only the fields we read are modelled. Every struct is `#[serde(default)]`
//! so a study with missing modules still decodes.

use serde::Deserialize;

/// One page of `GET /v2/studies`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudiesPage {
    pub studies: Vec<RawStudy>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawStudy {
    pub protocol_section: ProtocolSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProtocolSection {
    pub identification_module: IdentificationModule,
    pub status_module: StatusModule,
    pub sponsor_collaborators_module: SponsorCollaboratorsModule,
    pub description_module: DescriptionModule,
    pub conditions_module: ConditionsModule,
    pub design_module: DesignModule,
    pub arms_interventions_module: ArmsInterventionsModule,
    pub eligibility_module: EligibilityModule,
    pub contacts_locations_module: ContactsLocationsModule,
    pub outcomes_module: OutcomesModule,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IdentificationModule {
    pub nct_id: String,
    pub brief_title: String,
    pub official_title: String,
    pub acronym: String,
    pub organization: Organization,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Organization {
    pub full_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusModule {
    pub overall_status: String,
    pub start_date_struct: DateStruct,
    pub completion_date_struct: DateStruct,
    pub primary_completion_date_struct: DateStruct,
    pub study_first_post_date_struct: DateStruct,
    pub last_update_post_date_struct: DateStruct,
    pub study_first_submit_date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DateStruct {
    pub date: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SponsorCollaboratorsModule {
    pub lead_sponsor: LeadSponsor,
    pub responsible_party: ResponsibleParty,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LeadSponsor {
    pub name: String,
    pub class: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResponsibleParty {
    pub investigator_full_name: String,
    pub investigator_affiliation: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DescriptionModule {
    pub brief_summary: String,
    pub detailed_description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConditionsModule {
    pub conditions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DesignModule {
    pub study_type: String,
    pub phases: Vec<String>,
    pub enrollment_info: EnrollmentInfo,
    pub design_info: DesignInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnrollmentInfo {
    pub count: Option<u64>,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DesignInfo {
    pub allocation: String,
    pub intervention_model: String,
    pub primary_purpose: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArmsInterventionsModule {
    pub interventions: Vec<RawIntervention>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawIntervention {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EligibilityModule {
    pub eligibility_criteria: String,
    pub healthy_volunteers: bool,
    pub sex: String,
    pub minimum_age: String,
    pub maximum_age: String,
    pub std_ages: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContactsLocationsModule {
    pub locations: Vec<RawLocation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawLocation {
    pub facility: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub status: String,
    pub geo_point: Option<RawGeoPoint>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct RawGeoPoint {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutcomesModule {
    pub primary_outcomes: Vec<RawOutcome>,
    pub secondary_outcomes: Vec<RawOutcome>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawOutcome {
    pub measure: String,
    pub description: String,
    pub time_frame: String,
}
