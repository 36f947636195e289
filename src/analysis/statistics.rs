//! Trial statistics: distributions, enrollment and duration.

use crate::models::{DurationStats, EnrollmentStats, StatisticsBundle, TrialRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

const DAYS_PER_MONTH: f64 = 30.44;
const DAYS_PER_YEAR: f64 = 365.25;

/// Parse a registry date: `2020-01-15`, `2020-01`, `January 2020` or
/// `January 15, 2020`. Month-only forms resolve to the first of the month.
pub fn parse_registry_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(&format!("1 {}", s), "%d %B %Y") {
        return Some(d);
    }
    NaiveDate::parse_from_str(s, "%B %d, %Y").ok()
}

/// What a single record contributed to the duration statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationOutcome {
    /// Completion strictly after start, in days.
    Resolved(i64),
    /// Start or completion date is empty.
    MissingDates,
    /// A date string matched none of the known formats.
    Unparseable,
    /// Completion on or before start.
    NotAfterStart,
}

pub fn duration_outcome(record: &TrialRecord) -> DurationOutcome {
    let start = record.dates.start.trim();
    let completion = record.dates.completion.trim();

    if start.is_empty() || completion.is_empty() {
        return DurationOutcome::MissingDates;
    }

    let (Some(start), Some(completion)) =
        (parse_registry_date(start), parse_registry_date(completion))
    else {
        return DurationOutcome::Unparseable;
    };

    if completion > start {
        DurationOutcome::Resolved((completion - start).num_days())
    } else {
        DurationOutcome::NotAfterStart
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// Normalized records always carry these keys, so an empty value is the
// only "missing" signal left; it is grouped under "Unknown" rather than "".
fn bump(table: &mut BTreeMap<String, usize>, key: &str) {
    let key = if key.trim().is_empty() { "Unknown" } else { key };
    *table.entry(key.to_string()).or_default() += 1;
}

/// Running totals for one statistics computation.
#[derive(Debug, Default)]
pub struct StatisticsAccumulator {
    bundle: StatisticsBundle,
    durations: Vec<i64>,
    /// Records whose dates could not produce a duration.
    pub skipped_durations: usize,
}

impl StatisticsAccumulator {
    pub fn add(&mut self, record: &TrialRecord) {
        let bundle = &mut self.bundle;
        bundle.total_trials += 1;

        if !record.nct_id.is_empty() {
            bundle.trial_nct_ids.push(record.nct_id.clone());
        }

        for phase in &record.phases {
            *bundle.phases.entry(phase.clone()).or_default() += 1;
        }
        bump(&mut bundle.statuses, &record.status);
        bump(&mut bundle.study_types, &record.study_type);
        bump(&mut bundle.sponsors, &record.sponsor);

        if record.enrollment.count > 0 {
            bundle.enrollment.total += record.enrollment.count;
            bundle.enrollment.count += 1;
        }

        match duration_outcome(record) {
            DurationOutcome::Resolved(days) => {
                bundle.duration.total_days += days;
                bundle.duration.count += 1;
                self.durations.push(days);
            }
            outcome => {
                debug!("No duration for {}: {:?}", record.nct_id, outcome);
                self.skipped_durations += 1;
            }
        }
    }

    /// Compute averages and extremes; the raw durations are dropped.
    pub fn finish(self) -> StatisticsBundle {
        let mut bundle = self.bundle;

        let EnrollmentStats { total, count, .. } = bundle.enrollment;
        if count > 0 {
            bundle.enrollment.average = Some(total as f64 / count as f64);
        }

        let DurationStats {
            total_days, count, ..
        } = bundle.duration;
        if count > 0 {
            let avg_days = total_days as f64 / count as f64;
            bundle.duration.average_days = Some(round_to(avg_days, 1));
            bundle.duration.average_months = Some(round_to(avg_days / DAYS_PER_MONTH, 1));
            bundle.duration.average_years = Some(round_to(avg_days / DAYS_PER_YEAR, 2));
            bundle.duration.min_days = self.durations.iter().copied().min();
            bundle.duration.max_days = self.durations.iter().copied().max();
        }

        bundle
    }
}

/// Fold records into a statistics bundle.
pub fn summarize_trials(records: &[TrialRecord]) -> StatisticsBundle {
    let acc = records
        .iter()
        .fold(StatisticsAccumulator::default(), |mut acc, record| {
            acc.add(record);
            acc
        });

    debug!(
        "Statistics over {} trials ({} without a usable duration)",
        records.len(),
        acc.skipped_durations
    );

    acc.finish()
}
