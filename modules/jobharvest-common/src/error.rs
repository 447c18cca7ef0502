use thiserror::Error;

/// Which quota window refused a spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaScope {
    Daily,
    Monthly,
}

impl std::fmt::Display for QuotaScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaScope::Daily => f.write_str("daily"),
            QuotaScope::Monthly => f.write_str("monthly"),
        }
    }
}

/// Error taxonomy for the scraping core. Kinds are structured so callers
/// can apply the propagation policy (item errors never escape the adapter,
/// adapter errors never fail the slot, slot errors never fail the day).
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by upstream: {0}")]
    RateLimited(String),

    #[error("Quota exhausted ({scope}): {detail}")]
    QuotaExhausted { scope: QuotaScope, detail: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Adapter error in {source_id}: {detail}")]
    Adapter { source_id: String, detail: String },

    #[error("Request queue full (backpressure)")]
    Backpressure,

    #[error("Invalid record rejected: {0}")]
    InvalidRecord(String),

    #[error("Quota ledger unavailable")]
    LedgerUnavailable,

    #[error("Source '{0}' is disabled and must not be activated")]
    SourceDisabled(String),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl HarvestError {
    /// Transient errors are worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HarvestError::Network(_) | HarvestError::Timeout(_) | HarvestError::Backpressure
        )
    }

    /// Clone the structured kind. The `Anyhow` variant degrades to its
    /// rendered message.
    pub fn duplicate(&self) -> Self {
        match self {
            HarvestError::Network(m) => HarvestError::Network(m.clone()),
            HarvestError::RateLimited(m) => HarvestError::RateLimited(m.clone()),
            HarvestError::QuotaExhausted { scope, detail } => HarvestError::QuotaExhausted {
                scope: *scope,
                detail: detail.clone(),
            },
            HarvestError::Parse(m) => HarvestError::Parse(m.clone()),
            HarvestError::Adapter { source_id, detail } => HarvestError::Adapter {
                source_id: source_id.clone(),
                detail: detail.clone(),
            },
            HarvestError::Backpressure => HarvestError::Backpressure,
            HarvestError::InvalidRecord(m) => HarvestError::InvalidRecord(m.clone()),
            HarvestError::LedgerUnavailable => HarvestError::LedgerUnavailable,
            HarvestError::SourceDisabled(m) => HarvestError::SourceDisabled(m.clone()),
            HarvestError::Timeout(d) => HarvestError::Timeout(*d),
            HarvestError::Config(m) => HarvestError::Config(m.clone()),
            HarvestError::Anyhow(e) => HarvestError::Anyhow(anyhow::anyhow!("{e:#}")),
        }
    }
}
