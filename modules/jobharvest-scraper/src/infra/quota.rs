//! Monthly/daily quota ledger for the paid search provider.
//!
//! The ledger is the single authority for "may I spend?" decisions.
//! Callers never consult a cached copy; the paid-search adapter fails
//! closed when it has no ledger handle. Counters roll over lazily at UTC
//! midnight (daily) and on the first of the month (monthly).

use std::sync::Mutex;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::info;

use jobharvest_common::QuotaSnapshot;

/// Outcome of a spend attempt. Denials do not mutate the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendOutcome {
    Granted,
    DeniedMonthly,
    DeniedDaily,
    /// The ledger could not be consulted. Paid callers fail closed.
    Unavailable,
}

impl SpendOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, SpendOutcome::Granted)
    }
}

struct LedgerState {
    monthly_used: u32,
    daily_used: u32,
    day_anchor: NaiveDate,
    month_anchor: (i32, u32),
}

pub struct QuotaLedger {
    monthly_limit: u32,
    daily_limit: u32,
    state: Mutex<LedgerState>,
}

impl QuotaLedger {
    pub fn new(monthly_limit: u32, daily_limit: u32) -> Self {
        let today = Utc::now().date_naive();
        Self {
            monthly_limit,
            daily_limit,
            state: Mutex::new(LedgerState {
                monthly_used: 0,
                daily_used: 0,
                day_anchor: today,
                month_anchor: (today.year(), today.month()),
            }),
        }
    }

    /// Seed a ledger with pre-existing usage (restarts, tests).
    pub fn with_usage(monthly_limit: u32, daily_limit: u32, monthly_used: u32, daily_used: u32) -> Self {
        let ledger = Self::new(monthly_limit, daily_limit);
        {
            let mut state = ledger.state.lock().expect("ledger lock poisoned");
            state.monthly_used = monthly_used;
            state.daily_used = daily_used;
        }
        ledger
    }

    /// Atomically attempt to spend `n` units against both windows.
    pub fn try_spend(&self, n: u32) -> SpendOutcome {
        self.try_spend_at(n, Utc::now())
    }

    pub fn try_spend_at(&self, n: u32, now: DateTime<Utc>) -> SpendOutcome {
        let Ok(mut state) = self.state.lock() else {
            return SpendOutcome::Unavailable;
        };
        roll_over(&mut state, now);

        if state.monthly_used + n > self.monthly_limit {
            return SpendOutcome::DeniedMonthly;
        }
        if state.daily_used + n > self.daily_limit {
            return SpendOutcome::DeniedDaily;
        }
        state.monthly_used += n;
        state.daily_used += n;
        SpendOutcome::Granted
    }

    /// Return `n` units after a request that failed post-spend.
    pub fn refund(&self, n: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.monthly_used = state.monthly_used.saturating_sub(n);
            state.daily_used = state.daily_used.saturating_sub(n);
        }
    }

    pub fn status(&self) -> QuotaSnapshot {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> QuotaSnapshot {
        let next_midnight = (now + Duration::days(1))
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();

        let Ok(mut state) = self.state.lock() else {
            // Fail-closed view: report both windows as spent.
            return QuotaSnapshot {
                monthly_used: self.monthly_limit,
                monthly_limit: self.monthly_limit,
                daily_used: self.daily_limit,
                daily_limit: self.daily_limit,
                reset_at: next_midnight,
            };
        };
        roll_over(&mut state, now);

        QuotaSnapshot {
            monthly_used: state.monthly_used,
            monthly_limit: self.monthly_limit,
            daily_used: state.daily_used,
            daily_limit: self.daily_limit,
            reset_at: next_midnight,
        }
    }

    /// Log the current spend position, once per slot.
    pub fn log_status(&self) {
        let snap = self.status();
        info!(
            daily = format!("{}/{}", snap.daily_used, snap.daily_limit),
            monthly = format!("{}/{}", snap.monthly_used, snap.monthly_limit),
            "Quota status"
        );
    }
}

fn roll_over(state: &mut LedgerState, now: DateTime<Utc>) {
    let today = now.date_naive();
    if today != state.day_anchor {
        state.daily_used = 0;
        state.day_anchor = today;
    }
    let month = (today.year(), today.month());
    if month != state.month_anchor {
        state.monthly_used = 0;
        state.month_anchor = month;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn grants_until_daily_limit() {
        let ledger = QuotaLedger::new(250, 8);
        for _ in 0..8 {
            assert_eq!(ledger.try_spend(1), SpendOutcome::Granted);
        }
        assert_eq!(ledger.try_spend(1), SpendOutcome::DeniedDaily);
        let snap = ledger.status();
        assert_eq!(snap.daily_used, 8);
        assert_eq!(snap.monthly_used, 8);
    }

    #[test]
    fn denial_does_not_mutate() {
        let ledger = QuotaLedger::with_usage(250, 8, 0, 7);
        assert_eq!(ledger.try_spend(2), SpendOutcome::DeniedDaily);
        assert_eq!(ledger.status().daily_used, 7);
        assert_eq!(ledger.try_spend(1), SpendOutcome::Granted);
        assert_eq!(ledger.status().daily_used, 8);
    }

    #[test]
    fn monthly_denial_takes_precedence() {
        let ledger = QuotaLedger::with_usage(250, 8, 250, 0);
        assert_eq!(ledger.try_spend(1), SpendOutcome::DeniedMonthly);
    }

    #[test]
    fn refund_returns_units() {
        let ledger = QuotaLedger::new(250, 8);
        assert!(ledger.try_spend(1).is_granted());
        ledger.refund(1);
        let snap = ledger.status();
        assert_eq!(snap.daily_used, 0);
        assert_eq!(snap.monthly_used, 0);
    }

    #[test]
    fn refund_saturates_at_zero() {
        let ledger = QuotaLedger::new(250, 8);
        ledger.refund(5);
        assert_eq!(ledger.status().daily_used, 0);
    }

    #[test]
    fn daily_counter_resets_at_utc_midnight() {
        let ledger = QuotaLedger::new(250, 8);
        let day1 = Utc.with_ymd_and_hms(2026, 3, 10, 23, 0, 0).unwrap();
        for _ in 0..8 {
            assert!(ledger.try_spend_at(1, day1).is_granted());
        }
        assert_eq!(ledger.try_spend_at(1, day1), SpendOutcome::DeniedDaily);

        let day2 = Utc.with_ymd_and_hms(2026, 3, 11, 0, 5, 0).unwrap();
        assert!(ledger.try_spend_at(1, day2).is_granted());
        let snap = ledger.status_at(day2);
        assert_eq!(snap.daily_used, 1);
        assert_eq!(snap.monthly_used, 9, "monthly window unaffected by daily reset");
    }

    #[test]
    fn monthly_counter_resets_on_month_boundary() {
        let ledger = QuotaLedger::new(10, 8);
        let march = Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap();
        for _ in 0..8 {
            assert!(ledger.try_spend_at(1, march).is_granted());
        }

        let april = Utc.with_ymd_and_hms(2026, 4, 1, 0, 5, 0).unwrap();
        let snap = ledger.status_at(april);
        assert_eq!(snap.monthly_used, 0);
        assert_eq!(snap.daily_used, 0);
    }

    #[test]
    fn concurrent_spends_never_exceed_limits() {
        use std::sync::Arc;
        let ledger = Arc::new(QuotaLedger::new(250, 8));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                ledger.try_spend(1).is_granted()
            }));
        }
        let granted = handles
            .into_iter()
            .map(|h| h.join().expect("spender thread panicked"))
            .filter(|granted| *granted)
            .count();
        assert_eq!(granted, 8, "exactly the daily limit may be granted");
        assert_eq!(ledger.status().daily_used, 8);
    }
}
