//! In-process status surface consumed by collaborators: running state,
//! quota usage, per-source health, and the day's running totals.

use chrono::{DateTime, Utc};
use serde::Serialize;

use jobharvest_common::{AdapterStatus, QuotaSnapshot};

use crate::scheduling::scheduler::{RecentError, RunningTotals, Scheduler, SlotPhase};

#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub id: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative: Option<String>,
    pub healthy: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub jobs_last_run: usize,
    pub errors_last_run: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoreStatus {
    pub running: bool,
    pub phase: SlotPhase,
    pub current_slot: Option<u8>,
    pub quota: QuotaSnapshot,
    pub sources: Vec<SourceStatus>,
    pub totals: RunningTotals,
    pub recent_errors: Vec<RecentError>,
}

impl CoreStatus {
    pub fn source(&self, id: &str) -> Option<&SourceStatus> {
        self.sources.iter().find(|s| s.id == id)
    }
}

fn enabled_status(id: &str, status: AdapterStatus) -> SourceStatus {
    SourceStatus {
        id: id.to_string(),
        enabled: true,
        disabled_reason: None,
        alternative: None,
        healthy: status.healthy,
        last_run: status.last_run,
        jobs_last_run: status.jobs_last_run,
        errors_last_run: status.errors_last_run,
    }
}

impl Scheduler {
    pub fn status(&self) -> CoreStatus {
        let (phase, current_slot) = self.phase();
        let mut sources = Vec::new();

        let wired = self.sources_ref();
        if let Some(rss) = &wired.rss {
            sources.push(enabled_status(rss.id(), rss.status()));
        }
        if let Some(government) = &wired.government {
            sources.push(enabled_status(government.id(), government.status()));
        }
        if let Some(paid) = &wired.paid_search {
            sources.push(enabled_status(paid.id(), paid.status()));
        }
        if let Some(company) = &wired.company {
            sources.push(enabled_status(company.id(), company.status()));
        }

        for (id, reason, alternative) in self.disabled_sources() {
            sources.push(SourceStatus {
                id: id.clone(),
                enabled: false,
                disabled_reason: Some(reason.clone()),
                alternative: Some(alternative.clone()),
                healthy: false,
                last_run: None,
                jobs_last_run: 0,
                errors_last_run: 0,
            });
        }

        CoreStatus {
            running: self.is_running(),
            phase,
            current_slot,
            quota: self.quota().status(),
            sources,
            totals: self.totals(),
            recent_errors: self.recent_errors(),
        }
    }
}
