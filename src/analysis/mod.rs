//! Aggregation over normalized trial records.
//!
//! Criteria extraction and statistics both consume records produced by
//! the registry client and never fail on a single bad record.

pub mod criteria;
pub mod statistics;

pub use criteria::{analyze_criteria, decode_trials};
pub use statistics::summarize_trials;
