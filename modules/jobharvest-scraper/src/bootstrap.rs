//! Wiring. Everything is constructed once here and handed down by
//! `Arc`: the cache, rate limiter, processor, and quota ledger are shared
//! primitives; adapters hold only handles. Sources named in the disabled
//! registry (or disabled by configuration) are never constructed.

use std::sync::Arc;

use tracing::{info, warn};

use jobharvest_common::Config;
use serp_client::SerpClient;

use crate::infra::cache::ResultCache;
use crate::infra::processor::RequestProcessor;
use crate::infra::quota::QuotaLedger;
use crate::infra::rate_limiter::RateLimiter;
use crate::scheduling::scheduler::{Scheduler, SchedulerSources};
use crate::sources::catalog::{self, EmployerConfig, PortalConfig, RssSourceConfig};
use crate::sources::fetch::{HttpFetchHandler, FETCH_ENDPOINT};
use crate::sources::registry;
use crate::sources::{CompanyAdapter, GovernmentAdapter, PaidSearchAdapter, RssAdapter};
use crate::traits::JobSink;

/// Source catalogs used at wiring time. Defaults come from the built-in
/// catalog; deployments substitute their own.
pub struct Catalogs {
    pub rss: Vec<RssSourceConfig>,
    pub portals: Vec<PortalConfig>,
    pub employers: Vec<EmployerConfig>,
}

impl Default for Catalogs {
    fn default() -> Self {
        Self {
            rss: catalog::default_rss_sources(),
            portals: catalog::default_portals(),
            employers: catalog::default_employers(),
        }
    }
}

/// The assembled core. The processor handle is exposed so downstream
/// consumers can share the request fabric.
pub struct Harvester {
    pub scheduler: Arc<Scheduler>,
    pub processor: Arc<RequestProcessor>,
    pub ledger: Arc<QuotaLedger>,
}

/// Build and start the core against the given sink.
pub async fn build(config: &Config, catalogs: Catalogs, sink: Arc<dyn JobSink>) -> Harvester {
    let cache = Arc::new(ResultCache::new(config.cache_max_entries));
    let limiter = Arc::new(RateLimiter::new(config.rate_floor, config.rate_ceiling));
    let processor = Arc::new(RequestProcessor::new(Arc::clone(&cache), config.queue_bound));
    processor
        .register_handler(
            FETCH_ENDPOINT,
            Arc::new(HttpFetchHandler::new(Arc::clone(&limiter))),
        )
        .await;
    processor.start(config.worker_count);

    let ledger = Arc::new(QuotaLedger::new(
        config.quota_monthly_limit,
        config.quota_daily_limit,
    ));

    // Registry entries are always disabled; configuration can extend the
    // list but never shrink it.
    let mut disabled: Vec<(String, String, String)> = registry::DISABLED_SOURCES
        .iter()
        .map(|entry| {
            (
                entry.id.to_string(),
                entry.reason.to_string(),
                entry.alternative.to_string(),
            )
        })
        .collect();
    for id in &config.disabled_sources {
        if !disabled.iter().any(|(existing, _, _)| existing == id) {
            disabled.push((
                id.clone(),
                "disabled by configuration".to_string(),
                "none".to_string(),
            ));
        }
    }
    let mut sources = SchedulerSources::default();

    if is_off(&disabled, "rss") {
        warn!("RSS adapter disabled");
    } else {
        // Individual feed groups can be disabled too (e.g. one board).
        let groups: Vec<RssSourceConfig> = catalogs
            .rss
            .into_iter()
            .filter(|group| {
                if is_off(&disabled, &group.id) {
                    warn!(group = %group.id, "Feed group disabled");
                    false
                } else {
                    true
                }
            })
            .collect();
        sources.rss = Some(Arc::new(RssAdapter::new(groups, Arc::clone(&processor))));
    }

    if is_off(&disabled, "government") {
        warn!("Government adapter disabled");
    } else {
        let portals: Vec<PortalConfig> = catalogs
            .portals
            .into_iter()
            .filter(|portal| !is_off(&disabled, &portal.id))
            .collect();
        sources.government = Some(Arc::new(GovernmentAdapter::new(
            portals,
            Arc::clone(&processor),
        )));
    }

    if is_off(&disabled, "serpapi") {
        warn!("Paid search adapter disabled");
    } else if config.serp_api_key.is_empty() {
        warn!("Paid search adapter not wired: no credential");
        disabled.push((
            "serpapi".to_string(),
            "no credential configured".to_string(),
            "free sources only".to_string(),
        ));
    } else {
        let client = SerpClient::with_endpoint(
            config.serp_api_endpoint.clone(),
            config.serp_api_key.clone(),
        );
        sources.paid_search = Some(Arc::new(PaidSearchAdapter::new(
            client,
            Arc::clone(&ledger),
            Arc::clone(&limiter),
            Arc::clone(&cache),
            &config.serp_api_endpoint,
        )));
    }

    if is_off(&disabled, "company") {
        warn!("Company adapter disabled");
    } else {
        let employers: Vec<EmployerConfig> = catalogs
            .employers
            .into_iter()
            .filter(|employer| !is_off(&disabled, &employer.id))
            .collect();
        sources.company = Some(Arc::new(CompanyAdapter::new(
            employers,
            Arc::clone(&processor),
        )));
    }

    info!(
        rss = sources.rss.is_some(),
        government = sources.government.is_some(),
        paid_search = sources.paid_search.is_some(),
        company = sources.company.is_some(),
        disabled = disabled.len(),
        "Core wired"
    );

    let scheduler = Scheduler::new(sources, Arc::clone(&ledger), sink)
        .with_disabled(disabled)
        .with_daily_target(config.daily_target)
        .with_slot_deadline(config.slot_deadline);

    Harvester {
        scheduler: Arc::new(scheduler),
        processor,
        ledger,
    }
}

fn is_off(disabled: &[(String, String, String)], id: &str) -> bool {
    disabled.iter().any(|(existing, _, _)| existing == id)
}
