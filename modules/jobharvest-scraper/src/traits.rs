//! Extension points exposed to collaborators: the job sink and the
//! narrow adapter capabilities the scheduler drives.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use jobharvest_common::{AdapterStatus, HarvestError, Job, JobFilter, SourceResult, SourceTag};

use crate::sources::catalog::FeedPriority;
use crate::sources::paid_search::SearchStrategy;

/// Uniform contract every source adapter implements.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier used in plans, the disabled registry, and status.
    fn id(&self) -> &str;

    fn tag(&self) -> SourceTag;

    /// Fetch, parse, and yield raw records matching the filter. Partial
    /// success is expected: per-item failures are absorbed and counted.
    async fn scrape(&self, filter: &JobFilter) -> Result<SourceResult, HarvestError>;

    fn status(&self) -> AdapterStatus;
}

/// RSS adapters additionally scrape by feed-group priority so the slot
/// planner can run high-priority groups more often.
#[async_trait]
pub trait PrioritizedFeeds: SourceAdapter {
    async fn scrape_priorities(
        &self,
        priorities: &[FeedPriority],
        filter: &JobFilter,
    ) -> Result<SourceResult, HarvestError>;
}

/// Paid-search adapters run one of the strategic search types. The
/// strategy is always selected by the scheduler.
#[async_trait]
pub trait StrategicSearch: SourceAdapter {
    async fn search(
        &self,
        strategy: SearchStrategy,
        filter: &JobFilter,
    ) -> Result<SourceResult, HarvestError>;
}

/// Downstream consumer of normalized jobs. Must be idempotent on `job.id`.
/// Sink failures are logged and never fail a slot.
#[async_trait]
pub trait JobSink: Send + Sync {
    async fn upsert(&self, job: &Job) -> anyhow::Result<()>;
}

/// In-memory sink keyed by job id. Used by tests and dry runs; doubles as
/// the reference implementation of the idempotent upsert contract.
#[derive(Default)]
pub struct MemorySink {
    jobs: Mutex<HashMap<String, Job>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().expect("sink lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.jobs.lock().expect("sink lock poisoned").get(id).cloned()
    }

    pub fn all(&self) -> Vec<Job> {
        self.jobs
            .lock()
            .expect("sink lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl JobSink for MemorySink {
    async fn upsert(&self, job: &Job) -> anyhow::Result<()> {
        self.jobs
            .lock()
            .expect("sink lock poisoned")
            .insert(job.id.clone(), job.clone());
        Ok(())
    }
}
