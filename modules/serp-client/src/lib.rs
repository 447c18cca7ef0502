pub mod error;
pub mod types;

pub use error::{Result, SerpError};
pub use types::{ApplyOption, DetectedExtensions, JobResult, SearchResponse};

const DEFAULT_ENDPOINT: &str = "https://serpapi.com/search";
const ENGINE: &str = "google_jobs";

/// Thin client for the paid SERP provider's Google Jobs engine.
/// Quota accounting is the caller's responsibility; this client only
/// issues requests and parses responses.
pub struct SerpClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

/// Parameters for one search call.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: String,
    pub location: String,
    /// Provider page size; the adapter caps this for priority batches.
    pub num: u32,
}

impl SerpClient {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT.to_string(), api_key)
    }

    pub fn with_endpoint(endpoint: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }

    /// Issue one search. One call equals one unit of provider quota.
    pub async fn search_jobs(&self, params: &SearchParams) -> Result<SearchResponse> {
        tracing::info!(query = %params.query, location = %params.location, "SERP job search");

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("engine", ENGINE.to_string()),
                ("q", params.query.clone()),
                ("location", params.location.clone()),
                ("num", params.num.to_string()),
                ("api_key", self.api_key.clone()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(SerpError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SerpError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: SearchResponse = resp.json().await?;
        if let Some(message) = &parsed.error {
            return Err(SerpError::Api {
                status: status.as_u16(),
                message: message.clone(),
            });
        }

        tracing::info!(results = parsed.jobs_results.len(), "SERP search complete");
        Ok(parsed)
    }
}
