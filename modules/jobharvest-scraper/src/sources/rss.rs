//! RSS/Atom adapter. Feeds are provided for syndication, so this is the
//! highest-volume and least fragile source class. Feed groups carry a
//! priority so the slot planner can run the productive boards more often.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use jobharvest_common::{
    extract_company, extract_location, parse_salary, strip_html, AdapterStatus, HarvestError,
    JobFilter, RawJob, SourceResult, SourceTag,
};

use crate::infra::cache::TTL_RSS;
use crate::infra::processor::{Priority, RequestProcessor};
use crate::pipeline::score::passes_raw;
use crate::traits::{PrioritizedFeeds, SourceAdapter};

use super::catalog::{FeedPriority, RssSourceConfig};
use super::fetch::fetch_page;

const LEGAL_NOTE: &str = "RSS feeds are published for syndication";

pub struct RssAdapter {
    groups: Vec<RssSourceConfig>,
    processor: Arc<RequestProcessor>,
    status: Mutex<AdapterStatus>,
}

impl RssAdapter {
    pub fn new(groups: Vec<RssSourceConfig>, processor: Arc<RequestProcessor>) -> Self {
        Self {
            groups,
            processor,
            status: Mutex::new(AdapterStatus::default()),
        }
    }

    async fn scrape_feed(&self, feed_url: &str, group: &RssSourceConfig) -> Result<Vec<RawJob>, HarvestError> {
        let body = fetch_page(
            &self.processor,
            feed_url,
            Some((format!("rss:{feed_url}"), TTL_RSS)),
            Priority::Normal,
        )
        .await?;

        let feed = feed_rs::parser::parse(body.as_bytes())
            .map_err(|err| HarvestError::Parse(format!("feed {feed_url}: {err}")))?;

        let mut jobs = Vec::new();
        for entry in feed.entries {
            if let Some(raw) = project_entry(entry, group) {
                jobs.push(raw);
            }
        }
        info!(feed_url, jobs = jobs.len(), "Parsed feed");
        Ok(jobs)
    }

    fn record_run(&self, jobs: usize, errors: usize, attempted: usize) {
        let mut status = self.status.lock().expect("status lock poisoned");
        status.last_run = Some(Utc::now());
        status.jobs_last_run = jobs;
        status.errors_last_run = errors;
        status.healthy = attempted == 0 || errors < attempted;
    }
}

#[async_trait]
impl SourceAdapter for RssAdapter {
    fn id(&self) -> &str {
        "rss"
    }

    fn tag(&self) -> SourceTag {
        SourceTag::Rss
    }

    async fn scrape(&self, filter: &JobFilter) -> Result<SourceResult, HarvestError> {
        self.scrape_priorities(
            &[FeedPriority::High, FeedPriority::Medium, FeedPriority::Low],
            filter,
        )
        .await
    }

    fn status(&self) -> AdapterStatus {
        self.status.lock().expect("status lock poisoned").clone()
    }
}

#[async_trait]
impl PrioritizedFeeds for RssAdapter {
    async fn scrape_priorities(
        &self,
        priorities: &[FeedPriority],
        filter: &JobFilter,
    ) -> Result<SourceResult, HarvestError> {
        let mut jobs = Vec::new();
        let mut errors = 0usize;
        let mut attempted = 0usize;

        for group in self
            .groups
            .iter()
            .filter(|group| priorities.contains(&group.priority))
        {
            for feed_url in &group.feeds {
                attempted += 1;
                match self.scrape_feed(feed_url, group).await {
                    Ok(feed_jobs) => {
                        jobs.extend(feed_jobs.into_iter().filter(|raw| passes_raw(raw, filter)));
                    }
                    Err(err) => {
                        errors += 1;
                        warn!(feed_url, error = %err, "Feed scrape failed");
                    }
                }
            }
        }

        info!(
            jobs = jobs.len(),
            errors,
            feeds = attempted,
            "RSS scrape complete"
        );
        self.record_run(jobs.len(), errors, attempted);

        Ok(SourceResult {
            jobs,
            source_name: "rss_feeds".to_string(),
            legal_note: LEGAL_NOTE,
            api_calls_spent: 0,
        })
    }
}

/// Project one syndication entry onto a raw record. Entries without a
/// usable title or company are skipped.
fn project_entry(entry: feed_rs::model::Entry, group: &RssSourceConfig) -> Option<RawJob> {
    let title = entry.title.as_ref().map(|t| t.content.trim().to_string())?;
    if title.is_empty() {
        return None;
    }

    let summary = entry
        .summary
        .as_ref()
        .map(|t| t.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .unwrap_or_default();
    let description = strip_html(&summary);

    let company_name = entry
        .authors
        .iter()
        .map(|person| person.name.trim())
        .find(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| extract_company(&title, &description))?;

    let text = format!("{title} {description}");
    let posted_date = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.with_timezone(&Utc));
    let salary = parse_salary(&text);
    let categories: Vec<String> = entry.categories.iter().map(|c| c.term.clone()).collect();

    Some(RawJob {
        title,
        description: Some(description.clone()),
        company_name: Some(company_name),
        company_type: None,
        location: extract_location(&text),
        posted_date,
        salary_min: salary.map(|s| s.min),
        salary_max: salary.and_then(|s| s.max),
        salary_currency: None,
        job_type: None,
        job_level: Some(jobharvest_common::detect_job_level(&text)),
        remote_type: Some(jobharvest_common::detect_remote_type(&text)),
        source: Some(SourceTag::Rss),
        source_name: Some(group.source_name.clone()),
        source_url: entry.links.first().map(|link| link.href.clone()),
        skills: Vec::new(),
        benefits: Vec::new(),
        categories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobharvest_common::{JobLevel, RemoteType};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Jobs</title>
    <item>
      <title>Senior Rust Engineer at Discovery Health</title>
      <link>https://example.com/jobs/1</link>
      <description><![CDATA[<p>Remote role in Cape Town. Salary R90k per month. Rust and SQL.</p>]]></description>
      <pubDate>Mon, 20 Jul 2026 08:00:00 GMT</pubDate>
      <category>Full-time</category>
    </item>
    <item>
      <title></title>
      <link>https://example.com/jobs/2</link>
    </item>
    <item>
      <title>Mystery role with no company anywhere in sight</title>
      <link>https://example.com/jobs/3</link>
    </item>
  </channel>
</rss>"#;

    fn group() -> RssSourceConfig {
        RssSourceConfig {
            id: "test".into(),
            source_name: "TestBoard".into(),
            priority: FeedPriority::High,
            feeds: vec![],
        }
    }

    #[test]
    fn projects_entry_fields() {
        let feed = feed_rs::parser::parse(FEED.as_bytes()).unwrap();
        let group = group();
        let jobs: Vec<RawJob> = feed
            .entries
            .into_iter()
            .filter_map(|e| project_entry(e, &group))
            .collect();

        // Empty title and company-less entries are skipped.
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.title, "Senior Rust Engineer at Discovery Health");
        assert_eq!(job.company_name.as_deref(), Some("Discovery Health"));
        assert_eq!(job.source, Some(SourceTag::Rss));
        assert_eq!(job.source_name.as_deref(), Some("TestBoard"));
        assert_eq!(job.source_url.as_deref(), Some("https://example.com/jobs/1"));
        assert_eq!(job.job_level, Some(JobLevel::Senior));
        assert_eq!(job.remote_type, Some(RemoteType::Remote));
        assert!(job.location.as_deref().unwrap().contains("Cape Town"));
        assert_eq!(job.salary_min, Some(90_000.0 * 12.0));
        assert!(job.posted_date.is_some());
        assert_eq!(job.categories, vec!["Full-time".to_string()]);
    }

    #[test]
    fn description_is_html_stripped() {
        let feed = feed_rs::parser::parse(FEED.as_bytes()).unwrap();
        let group = group();
        let job = feed
            .entries
            .into_iter()
            .filter_map(|e| project_entry(e, &group))
            .next()
            .unwrap();
        let description = job.description.unwrap();
        assert!(!description.contains('<'));
        assert!(description.contains("Remote role in Cape Town"));
    }
}
