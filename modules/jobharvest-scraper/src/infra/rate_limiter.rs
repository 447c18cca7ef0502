//! Per-domain adaptive request pacing.
//!
//! Success shrinks the pacing interval toward a floor, failure doubles it
//! toward a ceiling, and a streak of failures forces a randomized cooldown.
//! Shared by every adapter through an `Arc`.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

const SUCCESS_SHRINK: f64 = 0.9;
const FAILURE_STREAK_COOLDOWN: u32 = 3;
const COOLDOWN_MIN_SECS: u64 = 30;
const COOLDOWN_MAX_SECS: u64 = 60;
const JITTER_FRACTION: f64 = 0.2;

#[derive(Debug, Clone)]
struct DomainState {
    next_allowed_at: Instant,
    current_interval: Duration,
    consecutive_failures: u32,
    cooldown_until: Option<Instant>,
}

/// Point-in-time pacing state for one domain, for status and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingSnapshot {
    pub current_interval: Duration,
    pub consecutive_failures: u32,
}

pub struct RateLimiter {
    floor: Duration,
    ceiling: Duration,
    domains: Mutex<HashMap<String, DomainState>>,
}

impl RateLimiter {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling,
            domains: Mutex::new(HashMap::new()),
        }
    }

    /// Block until a request to `domain` may proceed, then reserve the next
    /// pacing slot. Callers must invoke this before every outbound request.
    pub async fn wait(&self, domain: &str) {
        let wait_for = {
            let mut domains = self.domains.lock().await;
            let now = Instant::now();
            let state = domains
                .entry(domain.to_string())
                .or_insert_with(|| DomainState {
                    next_allowed_at: now,
                    current_interval: self.floor,
                    consecutive_failures: 0,
                    cooldown_until: None,
                });

            let mut earliest = state.next_allowed_at.max(now);
            if let Some(cooldown) = state.cooldown_until.take() {
                earliest = earliest.max(cooldown);
            }

            // Reserve the slot while still holding the lock so concurrent
            // callers on the same domain serialize correctly.
            state.next_allowed_at = earliest + state.current_interval;
            earliest.saturating_duration_since(now)
        };

        if !wait_for.is_zero() {
            let jitter = rand::rng().random_range(1.0 - JITTER_FRACTION..1.0 + JITTER_FRACTION);
            let jittered = wait_for.mul_f64(jitter);
            debug!(domain, wait_ms = jittered.as_millis() as u64, "Rate limiter pacing");
            tokio::time::sleep(jittered).await;
        }
    }

    /// Record a successful request: narrow the interval 10% toward the floor
    /// and clear the failure streak.
    pub async fn record_success(&self, domain: &str) {
        let mut domains = self.domains.lock().await;
        if let Some(state) = domains.get_mut(domain) {
            state.current_interval = state.current_interval.mul_f64(SUCCESS_SHRINK).max(self.floor);
            state.consecutive_failures = 0;
            state.cooldown_until = None;
        }
    }

    /// Record a failed request: double the interval toward the ceiling.
    /// Three consecutive failures arm a randomized 30–60 s cooldown that the
    /// next `wait` on this domain will serve out.
    pub async fn record_failure(&self, domain: &str) {
        let mut domains = self.domains.lock().await;
        let now = Instant::now();
        let state = domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainState {
                next_allowed_at: now,
                current_interval: self.floor,
                consecutive_failures: 0,
                cooldown_until: None,
            });

        state.current_interval = (state.current_interval * 2).min(self.ceiling);
        state.consecutive_failures += 1;

        if state.consecutive_failures >= FAILURE_STREAK_COOLDOWN {
            let secs = rand::rng().random_range(COOLDOWN_MIN_SECS..=COOLDOWN_MAX_SECS);
            state.cooldown_until = Some(now + Duration::from_secs(secs));
            warn!(
                domain,
                failures = state.consecutive_failures,
                cooldown_secs = secs,
                "Failure streak, cooling down"
            );
        }
    }

    /// Current pacing state for one domain.
    pub async fn snapshot(&self, domain: &str) -> Option<PacingSnapshot> {
        let domains = self.domains.lock().await;
        domains.get(domain).map(|s| PacingSnapshot {
            current_interval: s.current_interval,
            consecutive_failures: s.consecutive_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Duration::from_millis(250), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn failures_double_interval_toward_ceiling() {
        let rl = limiter();
        for _ in 0..3 {
            rl.record_failure("example.com").await;
        }
        let snap = rl.snapshot("example.com").await.unwrap();
        // floor * 2^3 = 2s
        assert!(snap.current_interval >= Duration::from_millis(2000));
        assert_eq!(snap.consecutive_failures, 3);
    }

    #[tokio::test]
    async fn interval_capped_at_ceiling() {
        let rl = limiter();
        for _ in 0..20 {
            rl.record_failure("example.com").await;
        }
        let snap = rl.snapshot("example.com").await.unwrap();
        assert_eq!(snap.current_interval, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn success_shrinks_ten_percent_toward_floor() {
        let rl = limiter();
        for _ in 0..3 {
            rl.record_failure("example.com").await;
        }
        let widened = rl.snapshot("example.com").await.unwrap().current_interval;
        rl.record_success("example.com").await;
        let snap = rl.snapshot("example.com").await.unwrap();
        assert_eq!(snap.current_interval, widened.mul_f64(0.9));
        assert_eq!(snap.consecutive_failures, 0);

        // Repeated successes bottom out at the floor.
        for _ in 0..100 {
            rl.record_success("example.com").await;
        }
        let snap = rl.snapshot("example.com").await.unwrap();
        assert_eq!(snap.current_interval, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn domains_are_independent() {
        let rl = limiter();
        rl.record_failure("a.example").await;
        rl.record_failure("a.example").await;
        assert!(rl.snapshot("b.example").await.is_none());
        let a = rl.snapshot("a.example").await.unwrap();
        assert_eq!(a.consecutive_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_reserves_pacing_slots() {
        let rl = RateLimiter::new(Duration::from_millis(250), Duration::from_secs(60));
        // First wait proceeds immediately; the second must be paced.
        rl.wait("example.com").await;
        let started = Instant::now();
        rl.wait("example.com").await;
        let elapsed = started.elapsed();
        // 250 ms interval minus 20% jitter lower bound.
        assert!(elapsed >= Duration::from_millis(200), "elapsed: {elapsed:?}");
    }
}
