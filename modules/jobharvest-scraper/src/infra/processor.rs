//! Request-processing fabric: a bounded priority queue with batching,
//! result caching, and a fixed worker pool. Every adapter routes its
//! outbound work through here; downstream consumers may share it.
//!
//! Ordering: strict priority preemption at dequeue, FIFO within a
//! priority level (by submission sequence). No ordering is guaranteed
//! across endpoints.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex, Notify, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use jobharvest_common::HarvestError;

use super::cache::ResultCache;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_millis(100);
const SUBMIT_WAIT: Duration = Duration::from_secs(5);
const RETRY_BASE: Duration = Duration::from_secs(2);
const RETRY_CAP: Duration = Duration::from_secs(30);

/// Lower value = more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Critical = 1,
    High = 2,
    Normal = 3,
    Low = 4,
    Background = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Queued,
    Cached,
    Batched,
    Completed,
    Failed,
}

pub struct Request {
    pub id: Uuid,
    pub endpoint: String,
    pub payload: Value,
    pub priority: Priority,
    pub cache_key: Option<String>,
    /// TTL used when a completed result is written back under `cache_key`.
    pub cache_ttl: Duration,
    pub batch_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Completion channel for batched requests (and any caller that wants
    /// out-of-band delivery).
    pub on_complete: Option<oneshot::Sender<RequestResult>>,
}

impl Request {
    pub fn new(endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint: endpoint.into(),
            payload,
            priority: Priority::Normal,
            cache_key: None,
            cache_ttl: Duration::from_secs(300),
            batch_key: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
            on_complete: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_cache(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.cache_key = Some(key.into());
        self.cache_ttl = ttl;
        self
    }

    pub fn with_batch_key(mut self, key: impl Into<String>) -> Self {
        self.batch_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RequestResult {
    pub request_id: Uuid,
    pub status: RequestStatus,
    pub data: Option<Value>,
    pub error: Option<Arc<HarvestError>>,
    pub processing_time: Duration,
}

impl RequestResult {
    fn cached(id: Uuid, data: Value) -> Self {
        Self {
            request_id: id,
            status: RequestStatus::Cached,
            data: Some(data),
            error: None,
            processing_time: Duration::ZERO,
        }
    }

    fn batched(id: Uuid) -> Self {
        Self {
            request_id: id,
            status: RequestStatus::Batched,
            data: None,
            error: None,
            processing_time: Duration::ZERO,
        }
    }

    fn failed(id: Uuid, error: Arc<HarvestError>, elapsed: Duration) -> Self {
        Self {
            request_id: id,
            status: RequestStatus::Failed,
            data: None,
            error: Some(error),
            processing_time: elapsed,
        }
    }
}

/// Handler for a single request on an endpoint.
#[async_trait]
pub trait EndpointHandler: Send + Sync {
    async fn handle(&self, payload: Value) -> Result<Value, HarvestError>;
}

/// Handler for a released batch. Must return one value per input payload,
/// in order.
#[async_trait]
pub trait BatchHandler: Send + Sync {
    async fn handle_batch(&self, payloads: Vec<Value>) -> Result<Vec<Value>, HarvestError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessorStats {
    pub total_requests: u64,
    pub completed: u64,
    pub failed: u64,
    pub cached: u64,
    pub batched: u64,
    pub retries: u64,
    pub queue_depth: usize,
}

struct QueuedItem {
    rank: u8,
    seq: u64,
    request: Request,
    done: oneshot::Sender<RequestResult>,
}

impl PartialEq for QueuedItem {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.seq == other.seq
    }
}

impl Eq for QueuedItem {}

impl PartialOrd for QueuedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedItem {
    // BinaryHeap is a max-heap: invert so the lowest (rank, seq) pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.rank, other.seq).cmp(&(self.rank, self.seq))
    }
}

struct PendingBatch {
    endpoint: String,
    items: Vec<(Uuid, Value, Option<oneshot::Sender<RequestResult>>)>,
}

pub struct RequestProcessor {
    cache: Arc<ResultCache>,
    queue: Mutex<BinaryHeap<QueuedItem>>,
    queue_bound: usize,
    seq: AtomicU64,
    work_ready: Notify,
    space_freed: Notify,
    handlers: RwLock<HashMap<String, Arc<dyn EndpointHandler>>>,
    batch_handlers: RwLock<HashMap<String, Arc<dyn BatchHandler>>>,
    batches: Mutex<HashMap<String, PendingBatch>>,
    batch_size: usize,
    batch_timeout: Duration,
    stats: Mutex<ProcessorStats>,
    shutting_down: AtomicBool,
}

impl RequestProcessor {
    pub fn new(cache: Arc<ResultCache>, queue_bound: usize) -> Self {
        Self {
            cache,
            queue: Mutex::new(BinaryHeap::new()),
            queue_bound,
            seq: AtomicU64::new(0),
            work_ready: Notify::new(),
            space_freed: Notify::new(),
            handlers: RwLock::new(HashMap::new()),
            batch_handlers: RwLock::new(HashMap::new()),
            batches: Mutex::new(HashMap::new()),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            stats: Mutex::new(ProcessorStats::default()),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub async fn register_handler(&self, endpoint: &str, handler: Arc<dyn EndpointHandler>) {
        self.handlers
            .write()
            .await
            .insert(endpoint.to_string(), handler);
        info!(endpoint, "Registered endpoint handler");
    }

    pub async fn register_batch_handler(&self, endpoint: &str, handler: Arc<dyn BatchHandler>) {
        self.batch_handlers
            .write()
            .await
            .insert(endpoint.to_string(), handler);
        info!(endpoint, "Registered batch handler");
    }

    /// Spawn the worker pool. Workers run until the owning runtime drops or
    /// `shutdown` is called.
    pub fn start(self: &Arc<Self>, worker_count: usize) {
        for worker_id in 0..worker_count {
            let processor = Arc::clone(self);
            tokio::spawn(async move {
                processor.worker_loop(worker_id).await;
            });
        }
        info!(workers = worker_count, "Request processor started");
    }

    pub fn shutdown(&self) {
        self.shutting_down.store(true, AtomicOrdering::SeqCst);
        self.work_ready.notify_waiters();
    }

    pub async fn stats(&self) -> ProcessorStats {
        let mut stats = *self.stats.lock().await;
        stats.queue_depth = self.queue.lock().await.len();
        stats
    }

    /// Submit a request through the pipeline: cache short-circuit, then
    /// batch accumulation, then the priority queue. Queued requests are
    /// awaited to completion; batched requests return immediately with
    /// completion delivered through `on_complete`.
    pub async fn submit(self: &Arc<Self>, mut request: Request) -> RequestResult {
        {
            let mut stats = self.stats.lock().await;
            stats.total_requests += 1;
        }

        // 1. Cache short-circuit.
        if let Some(key) = &request.cache_key {
            if let Some(value) = self.cache.get(key) {
                let mut stats = self.stats.lock().await;
                stats.cached += 1;
                return RequestResult::cached(request.id, value);
            }
        }

        // 2. Batch accumulation, when a batch handler is registered.
        if let Some(batch_key) = request.batch_key.clone() {
            if self.batch_handlers.read().await.contains_key(&request.endpoint) {
                return self.enqueue_batched(batch_key, request).await;
            }
        }

        // 3. Priority queue.
        let (done_tx, done_rx) = oneshot::channel();
        let timeout = request.timeout;
        let id = request.id;
        let started = Instant::now();
        let on_complete = request.on_complete.take();

        if let Err(result) = self.push_bounded(request, done_tx).await {
            let mut stats = self.stats.lock().await;
            stats.failed += 1;
            return result;
        }
        debug!(request_id = %id, "Request queued");

        let result = match tokio::time::timeout(timeout, done_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => RequestResult::failed(
                id,
                Arc::new(HarvestError::Adapter {
                    source_id: "processor".to_string(),
                    detail: "worker dropped the request".to_string(),
                }),
                started.elapsed(),
            ),
            Err(_) => RequestResult::failed(
                id,
                Arc::new(HarvestError::Timeout(timeout)),
                started.elapsed(),
            ),
        };

        {
            let mut stats = self.stats.lock().await;
            match result.status {
                RequestStatus::Completed => stats.completed += 1,
                RequestStatus::Failed => stats.failed += 1,
                _ => {}
            }
        }

        if let Some(tx) = on_complete {
            let _ = tx.send(result.clone());
        }
        result
    }

    /// Push onto the bounded queue, waiting up to the submit window for
    /// space. A full queue after the wait is a backpressure failure.
    async fn push_bounded(
        &self,
        request: Request,
        done: oneshot::Sender<RequestResult>,
    ) -> Result<(), RequestResult> {
        let id = request.id;
        let deadline = Instant::now() + SUBMIT_WAIT;
        let rank = request.priority as u8;
        let item = QueuedItem {
            rank,
            seq: self.seq.fetch_add(1, AtomicOrdering::SeqCst),
            request,
            done,
        };

        loop {
            {
                let mut queue = self.queue.lock().await;
                if queue.len() < self.queue_bound {
                    queue.push(item);
                    drop(queue);
                    self.work_ready.notify_one();
                    return Ok(());
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(request_id = %id, "Queue full, backpressure");
                return Err(RequestResult::failed(
                    id,
                    Arc::new(HarvestError::Backpressure),
                    Duration::ZERO,
                ));
            }
            let waited = tokio::time::timeout(remaining, self.space_freed.notified()).await;
            // Woken by a dequeue or timed out; either way re-check the queue.
            let _ = waited;
        }
    }

    async fn enqueue_batched(self: &Arc<Self>, batch_key: String, mut request: Request) -> RequestResult {
        let id = request.id;
        let endpoint = request.endpoint.clone();
        let on_complete = request.on_complete.take();

        let flush_now = {
            let mut batches = self.batches.lock().await;
            let batch = batches.entry(batch_key.clone()).or_insert_with(|| PendingBatch {
                endpoint: endpoint.clone(),
                items: Vec::new(),
            });
            let was_empty = batch.items.is_empty();
            batch.items.push((id, request.payload.clone(), on_complete));
            let full = batch.items.len() >= self.batch_size;

            if was_empty && !full {
                // First item arms the release timer.
                let key = batch_key.clone();
                let processor = Arc::clone(self);
                let timeout = self.batch_timeout;
                tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    processor.flush_batch(&key).await;
                });
            }
            full
        };

        if flush_now {
            self.flush_batch(&batch_key).await;
        }

        let mut stats = self.stats.lock().await;
        stats.batched += 1;
        RequestResult::batched(id)
    }

    /// Release a batch to its registered handler and deliver per-request
    /// results through the completion channels.
    pub async fn flush_batch(&self, batch_key: &str) {
        let batch = {
            let mut batches = self.batches.lock().await;
            match batches.remove(batch_key) {
                Some(batch) if !batch.items.is_empty() => batch,
                _ => return,
            }
        };

        let handler = {
            let handlers = self.batch_handlers.read().await;
            handlers.get(&batch.endpoint).cloned()
        };
        let Some(handler) = handler else {
            warn!(batch_key, endpoint = %batch.endpoint, "No batch handler at release time");
            return;
        };

        let started = Instant::now();
        let payloads: Vec<Value> = batch.items.iter().map(|(_, p, _)| p.clone()).collect();
        let count = payloads.len();
        let outcome = handler.handle_batch(payloads).await;
        let elapsed = started.elapsed();
        debug!(batch_key, count, ok = outcome.is_ok(), "Batch released");

        match outcome {
            Ok(results) if results.len() == count => {
                for ((id, _, tx), data) in batch.items.into_iter().zip(results) {
                    if let Some(tx) = tx {
                        let _ = tx.send(RequestResult {
                            request_id: id,
                            status: RequestStatus::Completed,
                            data: Some(data),
                            error: None,
                            processing_time: elapsed,
                        });
                    }
                }
            }
            Ok(results) => {
                let error = Arc::new(HarvestError::Parse(format!(
                    "batch handler returned {} results for {} requests",
                    results.len(),
                    count
                )));
                for (id, _, tx) in batch.items {
                    if let Some(tx) = tx {
                        let _ = tx.send(RequestResult::failed(id, Arc::clone(&error), elapsed));
                    }
                }
            }
            Err(err) => {
                let error = Arc::new(err);
                for (id, _, tx) in batch.items {
                    if let Some(tx) = tx {
                        let _ = tx.send(RequestResult::failed(id, Arc::clone(&error), elapsed));
                    }
                }
            }
        }
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        loop {
            if self.shutting_down.load(AtomicOrdering::SeqCst) {
                return;
            }
            let item = {
                let mut queue = self.queue.lock().await;
                queue.pop()
            };
            let Some(item) = item else {
                self.work_ready.notified().await;
                continue;
            };
            self.space_freed.notify_one();

            debug!(worker_id, request_id = %item.request.id, "Worker picked request");
            let result = self.execute(item.request).await;
            let _ = item.done.send(result);
        }
    }

    /// Run one request against its endpoint handler with retries and a
    /// cooperative timeout. Successful results are written back to the
    /// cache when the request carries a cache key.
    async fn execute(&self, request: Request) -> RequestResult {
        let started = Instant::now();
        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&request.endpoint).cloned()
        };
        let Some(handler) = handler else {
            return RequestResult::failed(
                request.id,
                Arc::new(HarvestError::Config(format!(
                    "no handler registered for endpoint '{}'",
                    request.endpoint
                ))),
                started.elapsed(),
            );
        };

        let attempts = request.max_retries + 1;
        let mut last_error = Arc::new(HarvestError::Timeout(request.timeout));

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = RETRY_BASE
                    .saturating_mul(2_u32.saturating_pow(attempt - 1))
                    .min(RETRY_CAP);
                debug!(request_id = %request.id, attempt, backoff_ms = backoff.as_millis() as u64, "Retrying");
                tokio::time::sleep(backoff).await;
                let mut stats = self.stats.lock().await;
                stats.retries += 1;
            }

            let remaining = request
                .timeout
                .saturating_sub(started.elapsed());
            if remaining.is_zero() {
                last_error = Arc::new(HarvestError::Timeout(request.timeout));
                break;
            }

            match tokio::time::timeout(remaining, handler.handle(request.payload.clone())).await {
                Ok(Ok(data)) => {
                    if let Some(key) = &request.cache_key {
                        self.cache.put(key, data.clone(), request.cache_ttl);
                    }
                    return RequestResult {
                        request_id: request.id,
                        status: RequestStatus::Completed,
                        data: Some(data),
                        error: None,
                        processing_time: started.elapsed(),
                    };
                }
                Ok(Err(err)) => {
                    let transient = err.is_transient();
                    last_error = Arc::new(err);
                    if !transient {
                        break;
                    }
                }
                Err(_) => {
                    last_error = Arc::new(HarvestError::Timeout(request.timeout));
                    break;
                }
            }
        }

        RequestResult::failed(request.id, last_error, started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn processor(bound: usize) -> Arc<RequestProcessor> {
        let cache = Arc::new(ResultCache::new(1000));
        Arc::new(RequestProcessor::new(cache, bound))
    }

    struct Echo;

    #[async_trait]
    impl EndpointHandler for Echo {
        async fn handle(&self, payload: Value) -> Result<Value, HarvestError> {
            Ok(payload)
        }
    }

    /// Records the order in which payload labels were handled.
    struct Recorder {
        order: Mutex<Vec<String>>,
        delay: Duration,
    }

    #[async_trait]
    impl EndpointHandler for Recorder {
        async fn handle(&self, payload: Value) -> Result<Value, HarvestError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let label = payload["label"].as_str().unwrap_or("?").to_string();
            self.order.lock().await.push(label);
            Ok(payload)
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl EndpointHandler for AlwaysFails {
        async fn handle(&self, _payload: Value) -> Result<Value, HarvestError> {
            Err(HarvestError::Parse("bad item".to_string()))
        }
    }

    struct CountingBatch {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BatchHandler for CountingBatch {
        async fn handle_batch(&self, payloads: Vec<Value>) -> Result<Vec<Value>, HarvestError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(payloads)
        }
    }

    #[tokio::test]
    async fn completed_request_round_trips() {
        let p = processor(100);
        p.register_handler("echo", Arc::new(Echo)).await;
        p.start(2);

        let result = p.submit(Request::new("echo", json!({"n": 1}))).await;
        assert_eq!(result.status, RequestStatus::Completed);
        assert_eq!(result.data, Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn cache_short_circuits_second_submit() {
        let p = processor(100);
        p.register_handler("echo", Arc::new(Echo)).await;
        p.start(1);

        let make = || {
            Request::new("echo", json!({"v": 7}))
                .with_cache("echo:7", Duration::from_secs(60))
        };
        let first = p.submit(make()).await;
        assert_eq!(first.status, RequestStatus::Completed);
        let second = p.submit(make()).await;
        assert_eq!(second.status, RequestStatus::Cached);
        assert_eq!(second.data, Some(json!({"v": 7})));

        let stats = p.stats().await;
        assert_eq!(stats.cached, 1);
    }

    #[tokio::test]
    async fn priority_preempts_fifo_within_level() {
        let p = processor(100);
        let recorder = Arc::new(Recorder {
            order: Mutex::new(Vec::new()),
            delay: Duration::from_millis(10),
        });
        p.register_handler("rec", Arc::clone(&recorder) as Arc<dyn EndpointHandler>)
            .await;

        // Queue everything before starting the single worker so dequeue
        // order is purely priority + sequence.
        let submit = |label: &str, priority: Priority| {
            let req = Request::new("rec", json!({ "label": label })).with_priority(priority);
            let p = Arc::clone(&p);
            tokio::spawn(async move { p.submit(req).await })
        };
        let handles = vec![
            submit("low-1", Priority::Low),
            submit("normal-1", Priority::Normal),
            submit("high-1", Priority::High),
        ];
        // Let the submissions enqueue.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let late = vec![
            submit("high-2", Priority::High),
            submit("critical", Priority::Critical),
        ];
        tokio::time::sleep(Duration::from_millis(50)).await;

        p.start(1);
        for h in handles.into_iter().chain(late) {
            h.await.expect("submit task panicked");
        }

        let order = recorder.order.lock().await.clone();
        assert_eq!(
            order,
            vec!["critical", "high-1", "high-2", "normal-1", "low-1"],
            "strict priority, FIFO within level"
        );
    }

    #[tokio::test]
    async fn batch_released_on_size() {
        let p = processor(100);
        let batch = Arc::new(CountingBatch {
            calls: AtomicUsize::new(0),
        });
        p.register_batch_handler("lookup", Arc::clone(&batch) as Arc<dyn BatchHandler>)
            .await;

        let mut receivers = Vec::new();
        for i in 0..DEFAULT_BATCH_SIZE {
            let (tx, rx) = oneshot::channel();
            let mut req = Request::new("lookup", json!({ "i": i })).with_batch_key("grp");
            req.on_complete = Some(tx);
            let result = p.submit(req).await;
            assert_eq!(result.status, RequestStatus::Batched);
            receivers.push(rx);
        }

        for rx in receivers {
            let result = rx.await.expect("batch completion delivered");
            assert_eq!(result.status, RequestStatus::Completed);
        }
        assert_eq!(batch.calls.load(AtomicOrdering::SeqCst), 1, "one release for a full batch");
    }

    #[tokio::test]
    async fn batch_released_on_timer() {
        let p = processor(100);
        let batch = Arc::new(CountingBatch {
            calls: AtomicUsize::new(0),
        });
        p.register_batch_handler("lookup", Arc::clone(&batch) as Arc<dyn BatchHandler>)
            .await;

        let (tx, rx) = oneshot::channel();
        let mut req = Request::new("lookup", json!({"i": 0})).with_batch_key("grp");
        req.on_complete = Some(tx);
        let result = p.submit(req).await;
        assert_eq!(result.status, RequestStatus::Batched);

        let completion = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("timer should release the batch")
            .expect("completion delivered");
        assert_eq!(completion.status, RequestStatus::Completed);
    }

    #[tokio::test]
    async fn missing_handler_fails_cleanly() {
        let p = processor(100);
        p.start(1);
        let result = p.submit(Request::new("nowhere", json!(null))).await;
        assert_eq!(result.status, RequestStatus::Failed);
        assert!(result.error.unwrap().to_string().contains("no handler"));
    }

    #[tokio::test]
    async fn non_transient_error_is_not_retried() {
        let p = processor(100);
        p.register_handler("parse", Arc::new(AlwaysFails)).await;
        p.start(1);

        let result = p
            .submit(Request::new("parse", json!(null)).with_retries(3))
            .await;
        assert_eq!(result.status, RequestStatus::Failed);
        let stats = p.stats().await;
        assert_eq!(stats.retries, 0, "parse failures are terminal");
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_yields_backpressure() {
        // Bound of 1 and no workers: the second submission cannot fit.
        let p = processor(1);
        p.register_handler("echo", Arc::new(Echo)).await;

        let first = {
            let p = Arc::clone(&p);
            tokio::spawn(async move {
                p.submit(Request::new("echo", json!(1)).with_timeout(Duration::from_secs(20)))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = p
            .submit(Request::new("echo", json!(2)).with_timeout(Duration::from_secs(20)))
            .await;
        assert_eq!(second.status, RequestStatus::Failed);
        assert!(matches!(
            second.error.unwrap().as_ref(),
            HarvestError::Backpressure
        ));
        first.abort();
    }
}
