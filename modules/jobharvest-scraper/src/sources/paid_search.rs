//! Paid-search adapter over the SERP provider. Every call is gated by a
//! ledger spend granted up front and refunded when the HTTP request
//! fails. The search strategy is always chosen by the scheduler; the
//! adapter only knows how to execute one.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serp_client::{JobResult, SearchParams, SerpClient, SerpError};
use tracing::{info, warn};

use jobharvest_common::{
    detect_job_level, detect_remote_type, extract_domain, parse_salary, strip_html, AdapterStatus,
    HarvestError, JobFilter, JobType, QuotaScope, RawJob, RemoteType, SourceResult, SourceTag,
};

use crate::infra::cache::{ResultCache, TTL_DERIVED};
use crate::infra::quota::{QuotaLedger, SpendOutcome};
use crate::infra::rate_limiter::RateLimiter;
use crate::pipeline::score::passes_raw;
use crate::traits::{SourceAdapter, StrategicSearch};

const LEGAL_NOTE: &str = "provider API results under commercial licence";
const DEFAULT_BATCH: u32 = 10;
const PRIORITY_BATCH: u32 = 8;

/// The three strategic search types. Selected by the scheduler per slot,
/// never by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Listings posted today.
    Fresh,
    /// High-value executive positions.
    Executive,
    /// Generic end-of-day sweep when the daily total falls short.
    GapFill,
}

impl SearchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStrategy::Fresh => "fresh",
            SearchStrategy::Executive => "executive",
            SearchStrategy::GapFill => "gap_fill",
        }
    }

    fn query(&self) -> &'static str {
        match self {
            SearchStrategy::Fresh => "new jobs posted today",
            SearchStrategy::Executive => "CEO OR CFO OR CTO OR director OR executive jobs",
            SearchStrategy::GapFill => "hiring vacancy jobs",
        }
    }

    fn location(&self) -> &'static str {
        match self {
            SearchStrategy::GapFill => "Cape Town, South Africa",
            _ => "South Africa",
        }
    }
}

pub struct PaidSearchAdapter {
    client: SerpClient,
    ledger: Arc<QuotaLedger>,
    limiter: Arc<RateLimiter>,
    cache: Arc<ResultCache>,
    /// Host key for rate-limiter pacing.
    provider_host: String,
    /// Hint such as "youth" reduces the batch size.
    priority_hint: Option<String>,
    status: Mutex<AdapterStatus>,
}

impl PaidSearchAdapter {
    pub fn new(
        client: SerpClient,
        ledger: Arc<QuotaLedger>,
        limiter: Arc<RateLimiter>,
        cache: Arc<ResultCache>,
        endpoint: &str,
    ) -> Self {
        Self {
            client,
            ledger,
            limiter,
            cache,
            provider_host: extract_domain(endpoint),
            priority_hint: None,
            status: Mutex::new(AdapterStatus::default()),
        }
    }

    pub fn with_priority_hint(mut self, hint: impl Into<String>) -> Self {
        self.priority_hint = Some(hint.into());
        self
    }

    fn batch_size(&self) -> u32 {
        match self.priority_hint.as_deref() {
            Some("youth") => PRIORITY_BATCH,
            _ => DEFAULT_BATCH,
        }
    }

    fn record_run(&self, jobs: usize, errors: usize) {
        let mut status = self.status.lock().expect("status lock poisoned");
        status.last_run = Some(Utc::now());
        status.jobs_last_run = jobs;
        status.errors_last_run = errors;
        status.healthy = errors == 0 || jobs > 0;
    }
}

#[async_trait]
impl SourceAdapter for PaidSearchAdapter {
    fn id(&self) -> &str {
        "serpapi"
    }

    fn tag(&self) -> SourceTag {
        SourceTag::SerpApi
    }

    async fn scrape(&self, filter: &JobFilter) -> Result<SourceResult, HarvestError> {
        self.search(SearchStrategy::Fresh, filter).await
    }

    fn status(&self) -> AdapterStatus {
        self.status.lock().expect("status lock poisoned").clone()
    }
}

#[async_trait]
impl StrategicSearch for PaidSearchAdapter {
    async fn search(
        &self,
        strategy: SearchStrategy,
        filter: &JobFilter,
    ) -> Result<SourceResult, HarvestError> {
        let query = if filter.keywords.is_empty() {
            strategy.query().to_string()
        } else {
            format!("{} {}", filter.keywords.join(" "), strategy.query())
        };
        let location = filter
            .location
            .clone()
            .unwrap_or_else(|| strategy.location().to_string());

        // A fresh cached result costs no quota at all.
        let cache_key = format!("serp:{}:{query}:{location}", strategy.as_str());
        if let Some(cached) = self.cache.get(&cache_key) {
            if let Ok(jobs) = serde_json::from_value::<Vec<RawJob>>(cached) {
                info!(strategy = strategy.as_str(), jobs = jobs.len(), "Paid search served from cache");
                return Ok(SourceResult {
                    jobs: jobs
                        .into_iter()
                        .filter(|raw| passes_raw(raw, filter))
                        .collect(),
                    source_name: "serpapi".to_string(),
                    legal_note: LEGAL_NOTE,
                    api_calls_spent: 0,
                });
            }
        }

        // The ledger is consulted for every call and is the only authority.
        match self.ledger.try_spend(1) {
            SpendOutcome::Granted => {}
            SpendOutcome::DeniedDaily => {
                return Err(HarvestError::QuotaExhausted {
                    scope: QuotaScope::Daily,
                    detail: format!("{} search skipped", strategy.as_str()),
                });
            }
            SpendOutcome::DeniedMonthly => {
                return Err(HarvestError::QuotaExhausted {
                    scope: QuotaScope::Monthly,
                    detail: format!("{} search skipped", strategy.as_str()),
                });
            }
            SpendOutcome::Unavailable => return Err(HarvestError::LedgerUnavailable),
        }

        let params = SearchParams {
            query,
            location,
            num: self.batch_size(),
        };

        info!(strategy = strategy.as_str(), "Paid search");
        self.limiter.wait(&self.provider_host).await;
        let response = match self.client.search_jobs(&params).await {
            Ok(response) => response,
            Err(err) => {
                // The spend bought nothing; give it back.
                self.ledger.refund(1);
                self.limiter.record_failure(&self.provider_host).await;
                self.record_run(0, 1);
                return Err(match err {
                    SerpError::RateLimited => {
                        HarvestError::RateLimited("provider returned 429".to_string())
                    }
                    SerpError::Network(detail) => HarvestError::Network(detail),
                    SerpError::Api { status, message } => HarvestError::Adapter {
                        source_id: "serpapi".to_string(),
                        detail: format!("status {status}: {message}"),
                    },
                    SerpError::Parse(detail) => HarvestError::Parse(detail),
                });
            }
        };

        self.limiter.record_success(&self.provider_host).await;

        let now = Utc::now();
        let projected: Vec<RawJob> = response
            .jobs_results
            .into_iter()
            .filter_map(|result| project_result(result, now))
            .collect();
        if let Ok(value) = serde_json::to_value(&projected) {
            self.cache.put(&cache_key, value, TTL_DERIVED);
        }
        let jobs: Vec<RawJob> = projected
            .into_iter()
            .filter(|raw| passes_raw(raw, filter))
            .collect();

        info!(
            strategy = strategy.as_str(),
            jobs = jobs.len(),
            "Paid search complete"
        );
        self.record_run(jobs.len(), 0);

        Ok(SourceResult {
            jobs,
            source_name: "serpapi".to_string(),
            legal_note: LEGAL_NOTE,
            api_calls_spent: 1,
        })
    }
}

/// Project one provider result onto a raw record. Results without a
/// company attribution are skipped.
fn project_result(result: JobResult, now: DateTime<Utc>) -> Option<RawJob> {
    let title = result.title.trim().to_string();
    if title.is_empty() {
        return None;
    }
    let company_name = result
        .company_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())?
        .to_string();

    let description = strip_html(result.description.as_deref().unwrap_or_default());
    let extensions = result.detected_extensions.clone().unwrap_or_default();
    let text = format!("{title} {description}");

    let salary = extensions
        .salary
        .as_deref()
        .and_then(parse_salary)
        .or_else(|| parse_salary(&text));

    let remote_type = if extensions.work_from_home == Some(true) {
        RemoteType::Remote
    } else {
        detect_remote_type(&text)
    };

    let source_url = result.canonical_url();

    Some(RawJob {
        title,
        description: Some(description),
        company_name: Some(company_name),
        company_type: None,
        location: result.location.clone(),
        posted_date: extensions
            .posted_at
            .as_deref()
            .and_then(|posted| parse_relative_date(posted, now)),
        salary_min: salary.map(|s| s.min),
        salary_max: salary.and_then(|s| s.max),
        salary_currency: None,
        job_type: extensions.schedule_type.as_deref().map(schedule_to_job_type),
        job_level: Some(detect_job_level(&text)),
        remote_type: Some(remote_type),
        source: Some(SourceTag::SerpApi),
        source_name: Some("serpapi".to_string()),
        source_url,
        skills: Vec::new(),
        benefits: Vec::new(),
        categories: Vec::new(),
    })
}

fn schedule_to_job_type(schedule: &str) -> JobType {
    let schedule = schedule.to_lowercase();
    if schedule.contains("part") {
        JobType::PartTime
    } else if schedule.contains("contract") {
        JobType::Contract
    } else if schedule.contains("intern") {
        JobType::Internship
    } else if schedule.contains("temp") {
        JobType::Temporary
    } else {
        JobType::FullTime
    }
}

/// Parse the provider's relative posting age ("3 days ago", "2 hours
/// ago", "just posted") into an instant.
fn parse_relative_date(posted: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let posted = posted.to_lowercase();
    if posted.contains("just") || posted.contains("today") {
        return Some(now);
    }

    let number: i64 = posted
        .split_whitespace()
        .find_map(|word| word.parse().ok())?;

    if posted.contains("minute") {
        Some(now - Duration::minutes(number))
    } else if posted.contains("hour") {
        Some(now - Duration::hours(number))
    } else if posted.contains("day") {
        Some(now - Duration::days(number))
    } else if posted.contains("week") {
        Some(now - Duration::weeks(number))
    } else if posted.contains("month") {
        Some(now - Duration::days(number * 30))
    } else {
        None
    }
}
