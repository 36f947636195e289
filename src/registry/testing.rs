//! In-memory registry used by tests.

use crate::registry::client::{RegistryError, RegistryTransport};
use crate::registry::raw::{RawStudy, StudiesPage};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;

/// Build a raw study from a `protocolSection` body.
pub fn study(protocol_section: Value) -> RawStudy {
    serde_json::from_value(json!({ "protocolSection": protocol_section }))
        .expect("valid study fixture")
}

/// A study with `n` numbered locations.
pub fn study_with_locations(nct_id: &str, n: usize) -> RawStudy {
    let locations: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "facility": format!("{} Site {}", nct_id, i),
                "city": "Madrid",
                "country": "Spain",
                "status": "RECRUITING"
            })
        })
        .collect();

    study(json!({
        "identificationModule": {"nctId": nct_id},
        "contactsLocationsModule": {"locations": locations}
    }))
}

/// Serves pages in order, chaining them with `page-<n>` tokens.
#[derive(Default)]
pub struct FakeRegistry {
    pages: Vec<Vec<RawStudy>>,
    studies: Vec<RawStudy>,
    failure: Mutex<Option<RegistryError>>,
    requests: Mutex<Vec<Vec<(&'static str, String)>>>,
}

impl FakeRegistry {
    pub fn with_pages(pages: Vec<Vec<RawStudy>>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn with_study(mut self, study: RawStudy) -> Self {
        self.studies.push(study);
        self
    }

    /// The next request fails with `error`.
    pub fn failing(error: RegistryError) -> Self {
        Self {
            failure: Mutex::new(Some(error)),
            ..Default::default()
        }
    }

    pub fn page_requests(&self) -> Vec<Vec<(&'static str, String)>> {
        self.requests.lock().unwrap().clone()
    }

    fn take_failure(&self) -> Option<RegistryError> {
        self.failure.lock().unwrap().take()
    }
}

#[async_trait]
impl RegistryTransport for FakeRegistry {
    async fn fetch_page(
        &self,
        params: &[(&'static str, String)],
    ) -> Result<StudiesPage, RegistryError> {
        self.requests.lock().unwrap().push(params.to_vec());

        if let Some(error) = self.take_failure() {
            return Err(error);
        }

        let index = params
            .iter()
            .find(|(k, _)| *k == "pageToken")
            .and_then(|(_, v)| v.strip_prefix("page-"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);

        let studies = self.pages.get(index).cloned().unwrap_or_default();
        let next_page_token = (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1));

        Ok(StudiesPage {
            studies,
            next_page_token,
        })
    }

    async fn fetch_study(&self, nct_id: &str) -> Result<RawStudy, RegistryError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }

        self.studies
            .iter()
            .find(|s| s.protocol_section.identification_module.nct_id == nct_id)
            .cloned()
            .ok_or_else(|| RegistryError::Status {
                status: 404,
                body: format!("{} not found", nct_id),
            })
    }
}
