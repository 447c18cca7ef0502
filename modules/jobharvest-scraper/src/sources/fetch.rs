//! The shared outbound fetch path. Adapters never touch the network
//! directly: every page and feed request is a `http.fetch` submission to
//! the request processor, which handles caching; the handler applies
//! per-host rate limiting and feeds success/failure back into it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use jobharvest_common::{extract_domain, HarvestError};

use crate::infra::processor::{EndpointHandler, Priority, Request, RequestProcessor, RequestStatus};
use crate::infra::rate_limiter::RateLimiter;

pub const FETCH_ENDPOINT: &str = "http.fetch";
const FETCH_RETRIES: u32 = 2;
const USER_AGENT: &str = "jobharvest/0.1 (aggregation; respects robots and rate limits)";

/// Endpoint handler performing rate-limited HTTP GETs.
pub struct HttpFetchHandler {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
}

impl HttpFetchHandler {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build fetch HTTP client");
        Self { client, limiter }
    }
}

#[async_trait]
impl EndpointHandler for HttpFetchHandler {
    async fn handle(&self, payload: Value) -> Result<Value, HarvestError> {
        let url = payload["url"]
            .as_str()
            .ok_or_else(|| HarvestError::Config("http.fetch payload missing url".to_string()))?
            .to_string();
        let domain = extract_domain(&url);

        self.limiter.wait(&domain).await;

        let response = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(err) => {
                self.limiter.record_failure(&domain).await;
                return Err(HarvestError::Network(err.to_string()));
            }
        };

        let status = response.status();
        if status.as_u16() == 429 {
            self.limiter.record_failure(&domain).await;
            warn!(url, "Upstream rate limit hit");
            return Err(HarvestError::RateLimited(format!("429 from {domain}")));
        }
        if status.is_server_error() {
            self.limiter.record_failure(&domain).await;
            return Err(HarvestError::Network(format!("status {status} from {domain}")));
        }
        if !status.is_success() {
            self.limiter.record_failure(&domain).await;
            return Err(HarvestError::Adapter {
                source_id: FETCH_ENDPOINT.to_string(),
                detail: format!("status {status} from {url}"),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| HarvestError::Network(err.to_string()))?;
        self.limiter.record_success(&domain).await;
        debug!(url, bytes = body.len(), "Fetched");
        Ok(json!({ "body": body }))
    }
}

/// Fetch a page body through the processor pipeline. `cache_key` short-
/// circuits repeat fetches within `ttl`.
pub async fn fetch_page(
    processor: &Arc<RequestProcessor>,
    url: &str,
    cache_key: Option<(String, Duration)>,
    priority: Priority,
) -> Result<String, HarvestError> {
    let mut request = Request::new(FETCH_ENDPOINT, json!({ "url": url }))
        .with_priority(priority)
        .with_retries(FETCH_RETRIES);
    if let Some((key, ttl)) = cache_key {
        request = request.with_cache(key, ttl);
    }

    let result = processor.submit(request).await;
    match result.status {
        RequestStatus::Cached | RequestStatus::Completed => result
            .data
            .as_ref()
            .and_then(|data| data["body"].as_str())
            .map(|body| body.to_string())
            .ok_or_else(|| HarvestError::Parse(format!("fetch of {url} returned no body"))),
        _ => {
            let error = result
                .error
                .map(|e| e.duplicate())
                .unwrap_or_else(|| HarvestError::Network(format!("fetch of {url} failed")));
            Err(error)
        }
    }
}
