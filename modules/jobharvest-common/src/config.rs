use std::env;
use std::time::Duration;

/// Core configuration loaded from environment variables.
/// Structured per-source settings (feed lists, selector profiles) live in
/// the scraper crate's catalog and can be overridden programmatically;
/// this struct carries the scalar knobs and credentials.
#[derive(Debug, Clone)]
pub struct Config {
    // Paid search provider
    pub serp_api_endpoint: String,
    pub serp_api_key: String,

    // Quota budget for the paid provider
    pub quota_monthly_limit: u32,
    pub quota_daily_limit: u32,

    // Result cache
    pub cache_max_entries: usize,

    // Rate limiter
    pub rate_floor: Duration,
    pub rate_ceiling: Duration,

    // Request processor
    pub worker_count: usize,
    pub queue_bound: usize,

    // Scheduler
    /// Daily unique-job target; gap-fill triggers below 90% of it.
    pub daily_target: u32,
    /// Wall-clock ceiling per slot.
    pub slot_deadline: Duration,

    /// Source ids that must never be wired, in addition to the built-in
    /// disabled registry.
    pub disabled_sources: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            serp_api_endpoint: env::var("SERP_API_ENDPOINT")
                .unwrap_or_else(|_| "https://serpapi.com/search".to_string()),
            serp_api_key: required_env("SERP_API_KEY"),
            quota_monthly_limit: env_parse("QUOTA_MONTHLY_LIMIT", 250),
            quota_daily_limit: env_parse("QUOTA_DAILY_LIMIT", 8),
            cache_max_entries: env_parse("CACHE_MAX_ENTRIES", 10_000),
            rate_floor: Duration::from_millis(env_parse("RATE_FLOOR_MS", 250)),
            rate_ceiling: Duration::from_secs(env_parse("RATE_CEILING_SECS", 60)),
            worker_count: env_parse("WORKER_COUNT", 8),
            queue_bound: env_parse("QUEUE_BOUND", 10_000),
            daily_target: env_parse("DAILY_TARGET", 1000),
            slot_deadline: Duration::from_secs(env_parse("SLOT_DEADLINE_SECS", 30 * 60)),
            disabled_sources: env::var("DISABLED_SOURCES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Config for offline use (tests, dry runs): no credentials required,
    /// paid search disabled by an empty key.
    pub fn offline() -> Self {
        Self {
            serp_api_endpoint: String::new(),
            serp_api_key: String::new(),
            quota_monthly_limit: 250,
            quota_daily_limit: 8,
            cache_max_entries: 10_000,
            rate_floor: Duration::from_millis(250),
            rate_ceiling: Duration::from_secs(60),
            worker_count: 8,
            queue_bound: 10_000,
            daily_target: 1000,
            slot_deadline: Duration::from_secs(30 * 60),
            disabled_sources: Vec::new(),
        }
    }

    /// Log configured knobs without leaking the credential.
    pub fn log_redacted(&self) {
        if self.serp_api_key.is_empty() {
            tracing::info!("SERP_API_KEY = (empty, paid search disabled)");
        } else {
            tracing::info!("SERP_API_KEY = ({} chars)", self.serp_api_key.len());
        }
        tracing::info!(
            monthly = self.quota_monthly_limit,
            daily = self.quota_daily_limit,
            "Quota limits"
        );
        tracing::info!(
            workers = self.worker_count,
            queue = self.queue_bound,
            cache = self.cache_max_entries,
            "Processor sizing"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_config_has_defaults() {
        let cfg = Config::offline();
        assert_eq!(cfg.quota_monthly_limit, 250);
        assert_eq!(cfg.quota_daily_limit, 8);
        assert_eq!(cfg.rate_floor, Duration::from_millis(250));
        assert_eq!(cfg.rate_ceiling, Duration::from_secs(60));
        assert_eq!(cfg.worker_count, 8);
    }
}
