use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which adapter class produced a record. The tag is part of the canonical
/// Job schema and drives the merge priority when identical jobs arrive from
/// more than one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Rss,
    Government,
    #[serde(rename = "serpapi")]
    SerpApi,
    Company,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Rss => "rss",
            SourceTag::Government => "government",
            SourceTag::SerpApi => "serpapi",
            SourceTag::Company => "company",
        }
    }

    /// Merge priority when two sources report the same job.
    /// Higher wins: serpapi > government > rss > company.
    pub fn merge_rank(&self) -> u8 {
        match self {
            SourceTag::SerpApi => 3,
            SourceTag::Government => 2,
            SourceTag::Rss => 1,
            SourceTag::Company => 0,
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    Internship,
    Temporary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobLevel {
    Entry,
    Mid,
    Senior,
    Manager,
    Director,
    CSuite,
}

impl JobLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "entry" => Some(JobLevel::Entry),
            "mid" => Some(JobLevel::Mid),
            "senior" => Some(JobLevel::Senior),
            "manager" => Some(JobLevel::Manager),
            "director" => Some(JobLevel::Director),
            "c_suite" | "csuite" | "executive" => Some(JobLevel::CSuite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteType {
    Remote,
    Hybrid,
    Onsite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyType {
    Private,
    Government,
    Academic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_type: Option<CompanyType>,
}

/// Canonical normalized job record. Created by adapters as [`RawJob`],
/// canonicalized by the normalizer (which assigns `id` and enforces the
/// schema invariants), then immutable once emitted to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Deterministic 16-hex-char identity over (title, company, location).
    pub id: String,
    pub title: String,
    pub description: String,
    pub company: Company,
    /// Free text, compared lowercase.
    pub location: String,
    pub posted_date: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_max: Option<f64>,
    pub salary_currency: String,
    pub job_type: JobType,
    pub job_level: JobLevel,
    pub remote_type: RemoteType,
    pub source: SourceTag,
    /// Display name of the concrete origin ("Careers24", "National Treasury").
    pub source_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub skills: Vec<String>,
    pub benefits: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
}

/// Pre-normalization record as produced by a source adapter.
/// Everything beyond the title is best-effort; the normalizer fills
/// defaults and rejects records that violate the schema invariants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawJob {
    pub title: String,
    pub description: Option<String>,
    pub company_name: Option<String>,
    pub company_type: Option<CompanyType>,
    pub location: Option<String>,
    pub posted_date: Option<DateTime<Utc>>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub job_type: Option<JobType>,
    pub job_level: Option<JobLevel>,
    pub remote_type: Option<RemoteType>,
    pub source: Option<SourceTag>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub skills: Vec<String>,
    pub benefits: Vec<String>,
    /// Feed categories / tags, used for job-type detection.
    pub categories: Vec<String>,
}

/// Batch-level filter. Every predicate is optional; absent predicates
/// always pass. Remote-friendly jobs satisfy the location predicate
/// implicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFilter {
    pub keywords: Vec<String>,
    pub location: Option<String>,
    pub job_level: Option<JobLevel>,
    pub min_salary: Option<f64>,
    pub industry: Option<String>,
    pub government_only: bool,
    pub academic_only: bool,
}

impl JobFilter {
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
            && self.location.is_none()
            && self.job_level.is_none()
            && self.min_salary.is_none()
            && self.industry.is_none()
            && !self.government_only
            && !self.academic_only
    }
}

/// What one adapter invocation yielded.
#[derive(Debug, Clone, Default)]
pub struct SourceResult {
    pub jobs: Vec<RawJob>,
    pub source_name: String,
    pub legal_note: &'static str,
    pub api_calls_spent: u32,
}

/// Health snapshot of a single adapter, refreshed after every scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterStatus {
    pub healthy: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub jobs_last_run: usize,
    pub errors_last_run: usize,
}

impl Default for AdapterStatus {
    fn default() -> Self {
        Self {
            healthy: true,
            last_run: None,
            jobs_last_run: 0,
            errors_last_run: 0,
        }
    }
}

/// Point-in-time view of the paid-API quota ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub monthly_used: u32,
    pub monthly_limit: u32,
    pub daily_used: u32,
    pub daily_limit: u32,
    pub reset_at: DateTime<Utc>,
}

impl QuotaSnapshot {
    pub fn monthly_remaining(&self) -> u32 {
        self.monthly_limit.saturating_sub(self.monthly_used)
    }

    pub fn daily_remaining(&self) -> u32 {
        self.daily_limit.saturating_sub(self.daily_used)
    }
}
