//! Hourly batch planner. Owns the adapters, consults the quota ledger,
//! runs each slot's actions concurrently under a wall-clock ceiling, and
//! aggregates raw records through normalization, dedup, merge, and the
//! sink. Slots are strictly sequential. Errors never cross a boundary:
//! an item error stays in its adapter, an adapter error stays in its
//! slot, and a slot error never fails the day.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use jobharvest_common::{HarvestError, Job, JobFilter, SourceResult};

use crate::infra::quota::QuotaLedger;
use crate::pipeline::{match_score, merge, normalize, Deduper};
use crate::traits::{JobSink, PrioritizedFeeds, SourceAdapter, StrategicSearch};

use super::slots::{SlotAction, SlotPlan};

const ERROR_RING_CAPACITY: usize = 32;
const DEFAULT_DAILY_TARGET: u32 = 1000;
const DEFAULT_SLOT_DEADLINE: Duration = Duration::from_secs(30 * 60);

/// Gap-fill triggers when the day's unique total is below 90% of target.
fn gap_fill_threshold(daily_target: u32) -> u64 {
    (daily_target as u64) * 9 / 10
}

/// The adapter handles a scheduler drives. Disabled sources are simply
/// absent; wiring refuses to construct them.
#[derive(Default)]
pub struct SchedulerSources {
    pub rss: Option<Arc<dyn PrioritizedFeeds>>,
    pub government: Option<Arc<dyn SourceAdapter>>,
    pub paid_search: Option<Arc<dyn StrategicSearch>>,
    pub company: Option<Arc<dyn SourceAdapter>>,
}

/// Counters accumulated across the day, exposed after every slot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunningTotals {
    pub jobs_collected: u64,
    pub duplicates_avoided: u64,
    pub invalid_records: u64,
    pub errors: u64,
    pub paid_calls_spent: u64,
    pub gap_fill_used: bool,
    pub by_source: HashMap<String, u64>,
}

/// One recent error, kept in a bounded ring for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct RecentError {
    pub source: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPhase {
    Idle,
    Planning,
    Executing,
    Aggregating,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotSummary {
    pub hour: u8,
    pub sources_checked: Vec<String>,
    pub skipped: Vec<String>,
    pub jobs_collected: usize,
    pub duplicates_avoided: u64,
    pub errors: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub slots: Vec<SlotSummary>,
    pub jobs_collected: u64,
    pub duplicates_avoided: u64,
    pub paid_calls_spent: u64,
    pub target_achieved: bool,
    pub jobs_per_paid_call: f64,
    pub duplicate_rate: f64,
}

type SlotHook = Box<dyn Fn(&SlotSummary) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&HarvestError, &str) + Send + Sync>;

pub struct Scheduler {
    plan: SlotPlan,
    sources: SchedulerSources,
    /// (id, reason, alternative) of sources refused at wiring time.
    disabled: Vec<(String, String, String)>,
    ledger: Arc<QuotaLedger>,
    sink: Arc<dyn JobSink>,
    filter: JobFilter,
    deduper: tokio::sync::Mutex<Deduper>,
    totals: std::sync::Mutex<RunningTotals>,
    recent_errors: std::sync::Mutex<VecDeque<RecentError>>,
    phase: std::sync::Mutex<(SlotPhase, Option<u8>)>,
    running: AtomicBool,
    daily_target: u32,
    slot_deadline: Duration,
    on_slot_complete: Option<SlotHook>,
    on_error: Option<ErrorHook>,
}

impl Scheduler {
    pub fn new(sources: SchedulerSources, ledger: Arc<QuotaLedger>, sink: Arc<dyn JobSink>) -> Self {
        Self {
            plan: SlotPlan::default_plan(),
            sources,
            disabled: Vec::new(),
            ledger,
            sink,
            filter: JobFilter::default(),
            deduper: tokio::sync::Mutex::new(Deduper::new()),
            totals: std::sync::Mutex::new(RunningTotals::default()),
            recent_errors: std::sync::Mutex::new(VecDeque::new()),
            phase: std::sync::Mutex::new((SlotPhase::Idle, None)),
            running: AtomicBool::new(false),
            daily_target: DEFAULT_DAILY_TARGET,
            slot_deadline: DEFAULT_SLOT_DEADLINE,
            on_slot_complete: None,
            on_error: None,
        }
    }

    pub fn with_plan(mut self, plan: SlotPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_filter(mut self, filter: JobFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_disabled(mut self, disabled: Vec<(String, String, String)>) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_daily_target(mut self, target: u32) -> Self {
        self.daily_target = target;
        self
    }

    pub fn with_slot_deadline(mut self, deadline: Duration) -> Self {
        self.slot_deadline = deadline;
        self
    }

    pub fn on_slot_complete(mut self, hook: SlotHook) -> Self {
        self.on_slot_complete = Some(hook);
        self
    }

    pub fn on_error(mut self, hook: ErrorHook) -> Self {
        self.on_error = Some(hook);
        self
    }

    pub fn totals(&self) -> RunningTotals {
        self.totals.lock().expect("totals lock poisoned").clone()
    }

    pub fn recent_errors(&self) -> Vec<RecentError> {
        self.recent_errors
            .lock()
            .expect("errors lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn phase(&self) -> (SlotPhase, Option<u8>) {
        *self.phase.lock().expect("phase lock poisoned")
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn disabled_sources(&self) -> &[(String, String, String)] {
        &self.disabled
    }

    pub(crate) fn sources_ref(&self) -> &SchedulerSources {
        &self.sources
    }

    pub fn quota(&self) -> &Arc<QuotaLedger> {
        &self.ledger
    }

    /// Start a fresh day: totals, the dedup window, and the gap-fill
    /// latch all reset. Called at the daily boundary.
    pub async fn reset_day(&self) {
        {
            let mut totals = self.totals.lock().expect("totals lock poisoned");
            *totals = RunningTotals::default();
        }
        self.deduper.lock().await.reset_day();
    }

    /// Run the whole day's slot table back to back on a fresh day.
    pub async fn run_daily(&self) -> DailySummary {
        info!(daily_target = self.daily_target, "Starting daily schedule");
        self.reset_day().await;
        self.sweep().await
    }

    /// Run all configured slots now without resetting the day's state:
    /// collect as much as the remaining quota allows.
    pub async fn run_full_sweep(&self) -> DailySummary {
        info!("Starting full sweep");
        self.sweep().await
    }

    async fn sweep(&self) -> DailySummary {
        self.running.store(true, Ordering::SeqCst);
        let mut slots = Vec::new();
        for hour in self.plan.hours() {
            // Slots are strictly sequential.
            let summary = self.run_slot(hour).await;
            let totals = self.totals();
            info!(
                hour,
                daily_total = totals.jobs_collected,
                paid = totals.paid_calls_spent,
                "Slot done"
            );
            slots.push(summary);
        }
        self.running.store(false, Ordering::SeqCst);

        let totals = self.totals();
        let processed = totals.jobs_collected + totals.duplicates_avoided;
        let summary = DailySummary {
            jobs_collected: totals.jobs_collected,
            duplicates_avoided: totals.duplicates_avoided,
            paid_calls_spent: totals.paid_calls_spent,
            target_achieved: totals.jobs_collected >= self.daily_target as u64,
            jobs_per_paid_call: totals.jobs_collected as f64
                / (totals.paid_calls_spent.max(1)) as f64,
            duplicate_rate: if processed == 0 {
                0.0
            } else {
                totals.duplicates_avoided as f64 / processed as f64
            },
            slots,
        };
        info!(
            jobs = summary.jobs_collected,
            duplicates = summary.duplicates_avoided,
            paid = summary.paid_calls_spent,
            target_achieved = summary.target_achieved,
            "Daily schedule complete"
        );
        summary
    }

    /// Run one slot: plan the actions, execute them concurrently under
    /// the slot deadline, aggregate whatever completed.
    pub async fn run_slot(&self, hour: u8) -> SlotSummary {
        let started_at = Utc::now();
        self.set_phase(SlotPhase::Planning, Some(hour));
        info!(hour, "Running slot");

        let mut skipped = Vec::new();
        let mut sources_checked = Vec::new();
        let mut errors = 0usize;
        let mut tasks: FuturesUnordered<JoinHandle<(String, Result<SourceResult, HarvestError>)>> =
            FuturesUnordered::new();

        for action in self.plan.actions(hour).iter().cloned().collect::<Vec<_>>() {
            let label = action.label();
            match self.spawn_action(action, &mut skipped).await {
                Some(task) => {
                    sources_checked.push(label);
                    tasks.push(task);
                }
                None => {}
            }
        }

        // Execute with a wall-clock ceiling; late tasks are cancelled and
        // whatever completed is still aggregated.
        self.set_phase(SlotPhase::Executing, Some(hour));
        let deadline = tokio::time::Instant::now() + self.slot_deadline;
        let mut outcomes: Vec<(String, Result<SourceResult, HarvestError>)> = Vec::new();
        loop {
            tokio::select! {
                next = tasks.next() => match next {
                    Some(Ok(outcome)) => outcomes.push(outcome),
                    Some(Err(join_err)) => {
                        errors += 1;
                        self.push_error("slot", &HarvestError::Adapter {
                            source_id: "slot".to_string(),
                            detail: format!("task aborted: {join_err}"),
                        });
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(hour, in_flight = tasks.len(), "Slot deadline reached, cancelling");
                    for task in tasks.iter() {
                        task.abort();
                    }
                    errors += tasks.len();
                    break;
                }
            }
        }

        // Aggregate the partial or complete batch.
        self.set_phase(SlotPhase::Aggregating, Some(hour));
        let (slot_jobs, slot_duplicates) = self.aggregate(&mut errors, outcomes).await;

        self.ledger.log_status();
        self.set_phase(SlotPhase::Idle, None);

        let summary = SlotSummary {
            hour,
            sources_checked,
            skipped,
            jobs_collected: slot_jobs,
            duplicates_avoided: slot_duplicates,
            errors,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            hour,
            jobs = summary.jobs_collected,
            duplicates = summary.duplicates_avoided,
            errors = summary.errors,
            "Slot complete"
        );
        if let Some(hook) = &self.on_slot_complete {
            hook(&summary);
        }
        summary
    }

    /// Resolve one action to a spawned scrape task, or record why it was
    /// skipped. Unhealthy adapters and exhausted quota skip the action
    /// without failing the slot.
    async fn spawn_action(
        &self,
        action: SlotAction,
        skipped: &mut Vec<String>,
    ) -> Option<JoinHandle<(String, Result<SourceResult, HarvestError>)>> {
        let label = action.label();
        let filter = self.filter.clone();

        macro_rules! skip {
            ($reason:expr) => {{
                info!(action = %label, reason = $reason, "Skipping action");
                skipped.push(format!("{label} ({})", $reason));
                return None;
            }};
        }

        match action {
            SlotAction::Rss(priorities) => {
                let Some(rss) = self.sources.rss.clone() else {
                    skip!("disabled");
                };
                if !rss.status().healthy {
                    skip!("unhealthy");
                }
                Some(tokio::spawn(async move {
                    let result = rss.scrape_priorities(&priorities, &filter).await;
                    (label, result)
                }))
            }
            SlotAction::Government => {
                let Some(government) = self.sources.government.clone() else {
                    skip!("disabled");
                };
                if !government.status().healthy {
                    skip!("unhealthy");
                }
                Some(tokio::spawn(async move {
                    let result = government.scrape(&filter).await;
                    (label, result)
                }))
            }
            SlotAction::Company => {
                let Some(company) = self.sources.company.clone() else {
                    skip!("disabled");
                };
                if !company.status().healthy {
                    skip!("unhealthy");
                }
                Some(tokio::spawn(async move {
                    let result = company.scrape(&filter).await;
                    (label, result)
                }))
            }
            SlotAction::PaidSearch(strategy) => {
                let Some(paid) = self.sources.paid_search.clone() else {
                    skip!("disabled");
                };
                if !paid.status().healthy {
                    skip!("unhealthy");
                }
                if strategy == crate::sources::SearchStrategy::GapFill {
                    let totals = self.totals();
                    if totals.gap_fill_used {
                        skip!("gap fill already used today");
                    }
                    if totals.jobs_collected >= gap_fill_threshold(self.daily_target) {
                        skip!("daily volume on target");
                    }
                }
                // The ledger is re-checked inside the adapter; this early
                // check avoids spawning a doomed call and logs once.
                if self.ledger.status().daily_remaining() == 0 {
                    skip!("daily quota exhausted");
                }
                if strategy == crate::sources::SearchStrategy::GapFill {
                    let mut totals = self.totals.lock().expect("totals lock poisoned");
                    totals.gap_fill_used = true;
                }
                Some(tokio::spawn(async move {
                    let result = paid.search(strategy, &filter).await;
                    (label, result)
                }))
            }
        }
    }

    /// Fold scrape outcomes through normalize → dedup/merge → sink.
    /// Returns (unique jobs this slot, duplicates this slot).
    async fn aggregate(
        &self,
        errors: &mut usize,
        outcomes: Vec<(String, Result<SourceResult, HarvestError>)>,
    ) -> (usize, u64) {
        let scraped_at = Utc::now();
        let mut deduper = self.deduper.lock().await;
        let duplicates_before = deduper.duplicates_avoided();
        let mut batch: HashMap<String, Job> = HashMap::new();
        let mut invalid = 0u64;
        let mut paid_calls = 0u64;

        for (label, outcome) in outcomes {
            let result = match outcome {
                Ok(result) => result,
                Err(err) => {
                    match &err {
                        HarvestError::QuotaExhausted { scope, .. } => {
                            // Expected once the budget is spent; once per slot.
                            info!(source = %label, %scope, "Paid search skipped: quota exhausted");
                        }
                        _ => {
                            *errors += 1;
                            self.push_error(&label, &err);
                        }
                    }
                    continue;
                }
            };

            paid_calls += result.api_calls_spent as u64;
            for raw in result.jobs {
                let job = match normalize(raw, scraped_at) {
                    Ok(job) => job,
                    Err(err) => {
                        invalid += 1;
                        tracing::debug!(source = %label, error = %err, "Record rejected");
                        continue;
                    }
                };

                if let Some(existing) = batch.remove(&job.id) {
                    // Same identity twice in one batch: merge, count the
                    // duplicate, keep the higher-priority attribution.
                    deduper.observe(&job.id);
                    let merged = merge(existing, job);
                    batch.insert(merged.id.clone(), merged);
                } else if deduper.observe(&job.id) {
                    batch.insert(job.id.clone(), job);
                }
                // else: already emitted earlier today; observe() counted it.
            }
        }

        let slot_duplicates = deduper.duplicates_avoided() - duplicates_before;
        drop(deduper);

        let mut emitted = 0usize;
        let mut by_source: HashMap<String, u64> = HashMap::new();
        for (_, mut job) in batch {
            if !self.filter.is_empty() {
                job.match_score = Some(match_score(&job, &self.filter));
            }
            *by_source.entry(job.source.as_str().to_string()).or_default() += 1;
            if let Err(err) = self.sink.upsert(&job).await {
                // Late sink failures are logged but never fail the slot.
                error!(job_id = %job.id, error = %err, "Sink upsert failed");
            }
            emitted += 1;
        }

        {
            let mut totals = self.totals.lock().expect("totals lock poisoned");
            totals.jobs_collected += emitted as u64;
            totals.duplicates_avoided += slot_duplicates;
            totals.invalid_records += invalid;
            totals.errors += *errors as u64;
            totals.paid_calls_spent += paid_calls;
            for (source, count) in by_source {
                *totals.by_source.entry(source).or_default() += count;
            }
        }

        (emitted, slot_duplicates)
    }

    fn set_phase(&self, phase: SlotPhase, hour: Option<u8>) {
        *self.phase.lock().expect("phase lock poisoned") = (phase, hour);
    }

    fn push_error(&self, source: &str, err: &HarvestError) {
        warn!(source, error = %err, "Adapter error recorded");
        if let Some(hook) = &self.on_error {
            hook(err, source);
        }
        let mut ring = self.recent_errors.lock().expect("errors lock poisoned");
        if ring.len() >= ERROR_RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(RecentError {
            source: source.to_string(),
            error: err.to_string(),
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_fill_threshold_is_ninety_percent() {
        assert_eq!(gap_fill_threshold(1000), 900);
        assert_eq!(gap_fill_threshold(500), 450);
    }
}
