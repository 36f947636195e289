//! Query construction for the registry's `query.term` grammar.
//!
//! Each present filter becomes one `AREA[<Field>]<value>` clause and the
//! clauses are joined with `AND` in declaration order.

use serde_json::Value;
use tracing::debug;

/// The filterable fields, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Condition,
    Phase,
    Status,
    Location,
    Sponsor,
    Intervention,
    StudyType,
    StartDateFrom,
    StartDateTo,
}

impl FilterField {
    pub const ALL: [FilterField; 9] = [
        FilterField::Condition,
        FilterField::Phase,
        FilterField::Status,
        FilterField::Location,
        FilterField::Sponsor,
        FilterField::Intervention,
        FilterField::StudyType,
        FilterField::StartDateFrom,
        FilterField::StartDateTo,
    ];

    /// Argument name used in tool calls.
    pub fn arg_name(self) -> &'static str {
        match self {
            FilterField::Condition => "condition",
            FilterField::Phase => "phase",
            FilterField::Status => "status",
            FilterField::Location => "location",
            FilterField::Sponsor => "sponsor",
            FilterField::Intervention => "intervention",
            FilterField::StudyType => "study_type",
            FilterField::StartDateFrom => "start_date_from",
            FilterField::StartDateTo => "start_date_to",
        }
    }

    /// Registry search area, for the fields that map to a plain clause.
    pub fn area(self) -> Option<&'static str> {
        match self {
            FilterField::Condition => Some("Condition"),
            FilterField::Phase => Some("Phase"),
            FilterField::Status => Some("OverallStatus"),
            FilterField::Location => Some("LocationCountry"),
            FilterField::Sponsor => Some("LeadSponsorName"),
            FilterField::Intervention => Some("InterventionName"),
            FilterField::StudyType => Some("StudyType"),
            FilterField::StartDateFrom | FilterField::StartDateTo => None,
        }
    }

    /// Description shown to the oracle.
    pub fn description(self) -> &'static str {
        match self {
            FilterField::Condition => "Medical condition (e.g., 'diabetes', 'asthma')",
            FilterField::Phase => "Trial phase (e.g., 'Phase 1', 'Phase 2', 'Phase 3')",
            FilterField::Status => "Trial status (e.g., 'Recruiting', 'Completed'). Omit this parameter to get all trials regardless of status.",
            FilterField::Location => "Country name (e.g., 'France', 'United States')",
            FilterField::Sponsor => "Lead sponsor name (e.g., 'Pfizer', 'Novartis')",
            FilterField::Intervention => "Intervention/treatment name (e.g., 'insulin')",
            FilterField::StudyType => "Study type: 'Interventional' or 'Observational'",
            FilterField::StartDateFrom => "Filter trials starting after this date (YYYY-MM-DD)",
            FilterField::StartDateTo => "Filter trials starting before this date (YYYY-MM-DD)",
        }
    }
}

/// A set of optional named predicates. `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    pub condition: Option<String>,
    pub phase: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub sponsor: Option<String>,
    pub intervention: Option<String>,
    pub study_type: Option<String>,
    pub start_date_from: Option<String>,
    pub start_date_to: Option<String>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition(mut self, value: impl Into<String>) -> Self {
        self.set(FilterField::Condition, value.into());
        self
    }

    pub fn phase(mut self, value: impl Into<String>) -> Self {
        self.set(FilterField::Phase, value.into());
        self
    }

    pub fn status(mut self, value: impl Into<String>) -> Self {
        self.set(FilterField::Status, value.into());
        self
    }

    pub fn location(mut self, value: impl Into<String>) -> Self {
        self.set(FilterField::Location, value.into());
        self
    }

    pub fn sponsor(mut self, value: impl Into<String>) -> Self {
        self.set(FilterField::Sponsor, value.into());
        self
    }

    /// Set a field. Blank values are treated as absent.
    pub fn set(&mut self, field: FilterField, value: String) {
        let value = Some(value).filter(|v| !v.trim().is_empty());
        *self.slot_mut(field) = value;
    }

    pub fn get(&self, field: FilterField) -> Option<&str> {
        let slot = match field {
            FilterField::Condition => &self.condition,
            FilterField::Phase => &self.phase,
            FilterField::Status => &self.status,
            FilterField::Location => &self.location,
            FilterField::Sponsor => &self.sponsor,
            FilterField::Intervention => &self.intervention,
            FilterField::StudyType => &self.study_type,
            FilterField::StartDateFrom => &self.start_date_from,
            FilterField::StartDateTo => &self.start_date_to,
        };
        slot.as_deref().filter(|v| !v.trim().is_empty())
    }

    fn slot_mut(&mut self, field: FilterField) -> &mut Option<String> {
        match field {
            FilterField::Condition => &mut self.condition,
            FilterField::Phase => &mut self.phase,
            FilterField::Status => &mut self.status,
            FilterField::Location => &mut self.location,
            FilterField::Sponsor => &mut self.sponsor,
            FilterField::Intervention => &mut self.intervention,
            FilterField::StudyType => &mut self.study_type,
            FilterField::StartDateFrom => &mut self.start_date_from,
            FilterField::StartDateTo => &mut self.start_date_to,
        }
    }

    /// Build a filter from tool-call arguments, reading only `fields`.
    ///
    /// Numbers and booleans are stringified; arrays, objects and nulls are
    /// dropped with a debug log.
    pub fn from_args(args: &Value, fields: &[FilterField]) -> Self {
        let mut filter = Self::default();
        for &field in fields {
            let value = match args.get(field.arg_name()) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(b)) => b.to_string(),
                Some(other) => {
                    debug!("Ignoring filter {}: unsupported value {}", field.arg_name(), other);
                    continue;
                }
                None => continue,
            };
            filter.set(field, value);
        }
        filter
    }

    pub fn is_empty(&self) -> bool {
        FilterField::ALL.iter().all(|&f| self.get(f).is_none())
    }

    /// The `AREA[...]` clauses for every present field, in declaration order.
    pub fn clauses(&self) -> Vec<String> {
        let mut clauses: Vec<String> = FilterField::ALL
            .iter()
            .filter_map(|&field| {
                let area = field.area()?;
                let value = self.get(field)?;
                Some(format!("AREA[{}]{}", area, value))
            })
            .collect();

        let from = self.get(FilterField::StartDateFrom);
        let to = self.get(FilterField::StartDateTo);
        if from.is_some() || to.is_some() {
            clauses.push(format!(
                "AREA[StartDate]RANGE[{},{}]",
                from.unwrap_or("MIN"),
                to.unwrap_or("MAX")
            ));
        }

        clauses
    }

    /// The full `query.term` value, or `None` for an unfiltered query.
    pub fn query_term(&self) -> Option<String> {
        let clauses = self.clauses();
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }
}

/// Query parameters for one page of `GET /studies`.
pub fn page_params(
    filter: &QueryFilter,
    page_size: usize,
    page_token: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("format", "json".to_string()),
        ("pageSize", page_size.to_string()),
    ];

    if let Some(term) = filter.query_term() {
        params.push(("query.term", term));
    }

    if let Some(token) = page_token {
        params.push(("pageToken", token.to_string()));
    }

    params
}
