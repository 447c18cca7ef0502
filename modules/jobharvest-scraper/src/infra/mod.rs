pub mod cache;
pub mod processor;
pub mod quota;
pub mod rate_limiter;

pub use cache::ResultCache;
pub use processor::{Priority, ProcessorStats, Request, RequestProcessor, RequestResult, RequestStatus};
pub use quota::{QuotaLedger, SpendOutcome};
pub use rate_limiter::RateLimiter;
