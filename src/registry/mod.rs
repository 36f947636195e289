//! ClinicalTrials.gov registry access.
//!
//! Query construction, raw payload types, normalization and the
//! paginated client live here.

pub mod client;
pub mod normalize;
pub mod query;
pub mod raw;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{HttpRegistry, RegistryClient, RegistryError, RegistryTransport};
pub use query::{FilterField, QueryFilter};
