//! Registry client: bounded, paginated fetches against the studies endpoint.
//!
//! The client is generic over a [`RegistryTransport`] so the fetch
//! logic can run against the live API or an in-memory registry.

use crate::models::{CountResult, SiteRecord, TrialRecord};
use crate::registry::normalize::{flatten_sites, parse_study, StudyView};
use crate::registry::query::{page_params, QueryFilter};
use crate::registry::raw::{RawStudy, StudiesPage};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Default studies endpoint.
pub const DEFAULT_BASE_URL: &str = "https://clinicaltrials.gov/api/v2/studies";

/// Page size used when counting.
pub const COUNT_PAGE_SIZE: usize = 100;

/// Pages fetched at most when counting (hard cap of 300 records).
pub const COUNT_MAX_PAGES: usize = 3;

/// Caller-visible cap on records per search.
pub const MAX_SEARCH_RESULTS: usize = 20;

/// Global cap on flattened site records.
pub const MAX_SITES: usize = 50;

/// Transport and parse failures at the registry boundary.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to registry at {0}")]
    Connect(String),

    #[error("Registry API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to send request: {0}")]
    Request(String),

    #[error("Failed to parse registry response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Raw access to the registry.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// `GET <base>?<params>`.
    async fn fetch_page(&self, params: &[(&'static str, String)])
        -> Result<StudiesPage, RegistryError>;

    /// `GET <base>/<nct_id>`.
    async fn fetch_study(&self, nct_id: &str) -> Result<RawStudy, RegistryError>;
}

/// reqwest-backed transport for the live API.
pub struct HttpRegistry {
    http_client: reqwest::Client,
    base_url: String,
    timeout_seconds: u64,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>, timeout_seconds: u64) -> Result<Self, RegistryError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| RegistryError::Request(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_seconds,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> RegistryError {
        if e.is_timeout() {
            RegistryError::Timeout(self.timeout_seconds)
        } else if e.is_connect() {
            RegistryError::Connect(self.base_url.clone())
        } else {
            RegistryError::Request(e.to_string())
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, RegistryError> {
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(RegistryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl RegistryTransport for HttpRegistry {
    async fn fetch_page(
        &self,
        params: &[(&'static str, String)],
    ) -> Result<StudiesPage, RegistryError> {
        debug!("GET {} {:?}", self.base_url, params);
        self.get_json(self.http_client.get(&self.base_url).query(params))
            .await
    }

    async fn fetch_study(&self, nct_id: &str) -> Result<RawStudy, RegistryError> {
        let url = format!("{}/{}", self.base_url, nct_id.trim());
        debug!("GET {}", url);
        self.get_json(self.http_client.get(&url)).await
    }
}

/// Clamp a requested result count to `0..=MAX_SEARCH_RESULTS`.
pub fn clamp_max_results(requested: i64) -> usize {
    requested.clamp(0, MAX_SEARCH_RESULTS as i64) as usize
}

/// The registry client.
pub struct RegistryClient<T: RegistryTransport> {
    transport: T,
}

impl<T: RegistryTransport> RegistryClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Count matching trials, fetching at most 300 records.
    pub async fn count(&self, filter: &QueryFilter) -> Result<CountResult, RegistryError> {
        let mut total = 0;
        let mut next_token: Option<String> = None;

        for page_number in 1..=COUNT_MAX_PAGES {
            let params = page_params(filter, COUNT_PAGE_SIZE, next_token.as_deref());
            let page = self.transport.fetch_page(&params).await?;

            total += page.studies.len();
            debug!("Count page {}: {} studies", page_number, page.studies.len());

            match page.next_page_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => {
                    info!("Counted {} trials (exact)", total);
                    return Ok(CountResult::exact(total));
                }
            }
        }

        info!("Counted at least {} trials (page cap reached)", total);
        Ok(CountResult::at_least(total))
    }

    /// Fetch one page of compact records, at most 20.
    pub async fn search(
        &self,
        filter: &QueryFilter,
        max_results: i64,
    ) -> Result<Vec<TrialRecord>, RegistryError> {
        let page_size = clamp_max_results(max_results);
        if page_size == 0 {
            debug!("Search skipped: max_results {} asks for nothing", max_results);
            return Ok(Vec::new());
        }

        let params = page_params(filter, page_size, None);
        let page = self.transport.fetch_page(&params).await?;

        let records: Vec<TrialRecord> = page
            .studies
            .iter()
            .take(page_size)
            .map(|s| parse_study(s, StudyView::Compact))
            .collect();

        info!("Search returned {} trials", records.len());
        Ok(records)
    }

    /// Fetch one trial by identifier, in full detail.
    pub async fn show(&self, nct_id: &str) -> Result<TrialRecord, RegistryError> {
        let study = self.transport.fetch_study(nct_id).await?;
        Ok(parse_study(&study, StudyView::Full))
    }

    /// Flatten the locations of up to `max_results` trials, at most 50 sites.
    pub async fn extract_sites(
        &self,
        filter: &QueryFilter,
        max_results: i64,
    ) -> Result<Vec<SiteRecord>, RegistryError> {
        let page_size = clamp_max_results(max_results);
        if page_size == 0 {
            debug!("Site extraction skipped: max_results {} asks for nothing", max_results);
            return Ok(Vec::new());
        }

        let params = page_params(filter, page_size, None);
        let page = self.transport.fetch_page(&params).await?;

        let studies = &page.studies[..page.studies.len().min(page_size)];
        let sites = flatten_sites(studies, MAX_SITES);

        info!(
            "Extracted {} sites from {} trials",
            sites.len(),
            studies.len()
        );
        Ok(sites)
    }
}
