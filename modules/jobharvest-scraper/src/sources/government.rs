//! Government-portal adapter. Public-sector vacancy pages are public
//! domain; each portal is described by a declarative selector profile.
//! Salary is estimated from the portal's numeric level/grade field using
//! the public service salary scales.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use jobharvest_common::{
    AdapterStatus, CompanyType, HarvestError, JobFilter, JobLevel, JobType, RawJob, SourceResult,
    SourceTag,
};

use crate::infra::cache::TTL_GOVERNMENT;
use crate::infra::processor::{Priority, RequestProcessor};
use crate::pipeline::score::passes_raw;
use crate::traits::SourceAdapter;

use super::catalog::PortalConfig;
use super::fetch::fetch_page;

const LEGAL_NOTE: &str = "government job postings are public information";

/// Standard benefits attached to every SA public-service post.
pub const GOVERNMENT_BENEFITS: &[&str] = &[
    "Medical Aid",
    "Pension Fund",
    "Housing Allowance",
    "13th Cheque",
    "Leave Benefits",
];

/// Public-service salary scales by numeric level band, annual ZAR.
const SALARY_SCALES: &[(u32, u32, f64, f64)] = &[
    (1, 3, 100_000.0, 200_000.0),
    (4, 6, 200_000.0, 400_000.0),
    (7, 9, 400_000.0, 700_000.0),
    (10, 12, 700_000.0, 1_200_000.0),
    (13, 15, 1_200_000.0, 2_000_000.0),
    (16, u32::MAX, 2_000_000.0, 3_000_000.0),
];

pub struct GovernmentAdapter {
    portals: Vec<PortalConfig>,
    processor: Arc<RequestProcessor>,
    status: Mutex<AdapterStatus>,
}

impl GovernmentAdapter {
    pub fn new(portals: Vec<PortalConfig>, processor: Arc<RequestProcessor>) -> Self {
        Self {
            portals,
            processor,
            status: Mutex::new(AdapterStatus::default()),
        }
    }

    async fn scrape_portal(&self, portal: &PortalConfig) -> Result<Vec<RawJob>, HarvestError> {
        let html = fetch_page(
            &self.processor,
            &portal.listings_url,
            Some((format!("gov:{}", portal.id), TTL_GOVERNMENT)),
            Priority::Normal,
        )
        .await?;

        let jobs = parse_portal(&html, portal)?;
        info!(portal = %portal.id, jobs = jobs.len(), "Parsed portal listings");
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
impl SourceAdapter for GovernmentAdapter {
    fn id(&self) -> &str {
        "government"
    }

    fn tag(&self) -> SourceTag {
        SourceTag::Government
    }

    async fn scrape(&self, filter: &JobFilter) -> Result<SourceResult, HarvestError> {
        let mut jobs = Vec::new();
        let mut errors = 0usize;

        for portal in &self.portals {
            match self.scrape_portal(portal).await {
                Ok(portal_jobs) => {
                    jobs.extend(portal_jobs.into_iter().filter(|raw| passes_raw(raw, filter)));
                }
                Err(err) => {
                    errors += 1;
                    warn!(portal = %portal.id, error = %err, "Portal scrape failed");
                }
            }
        }

        info!(jobs = jobs.len(), errors, portals = self.portals.len(), "Government scrape complete");
        self.record_run(jobs.len(), errors, self.portals.len());

        Ok(SourceResult {
            jobs,
            source_name: "government".to_string(),
            legal_note: LEGAL_NOTE,
            api_calls_spent: 0,
        })
    }

    fn status(&self) -> AdapterStatus {
        self.status.lock().expect("status lock poisoned").clone()
    }
}

/// Walk the listings page with the portal's selector profile.
/// Rows without a title are skipped; unknown fields are ignored.
fn parse_portal(html: &str, portal: &PortalConfig) -> Result<Vec<RawJob>, HarvestError> {
    let document = Html::parse_document(html);
    let selectors = &portal.selectors;
    let row_selector = Selector::parse(&selectors.job_list)
        .map_err(|err| HarvestError::Parse(format!("bad job_list selector: {err}")))?;

    let mut jobs = Vec::new();
    for row in document.select(&row_selector) {
        let Some(title) = select_text(&row, &selectors.title) else {
            continue;
        };

        let department = selectors
            .department
            .as_deref()
            .and_then(|sel| select_text(&row, sel));
        let location = selectors
            .location
            .as_deref()
            .and_then(|sel| select_text(&row, sel))
            .unwrap_or_else(|| portal.default_location.clone());
        let level_text = selectors
            .level
            .as_deref()
            .and_then(|sel| select_text(&row, sel));
        let salary = level_text.as_deref().and_then(estimate_salary_from_level);

        let source_url = selectors
            .link
            .as_deref()
            .and_then(|sel| select_href(&row, sel))
            .map(|href| resolve_url(&href, &portal.base_url));

        let company_type = if portal.academic {
            CompanyType::Academic
        } else {
            CompanyType::Government
        };

        jobs.push(RawJob {
            title: title.clone(),
            description: department.map(|dept| format!("Department: {dept}")),
            company_name: Some(portal.name.clone()),
            company_type: Some(company_type),
            location: Some(location),
            posted_date: None,
            salary_min: salary.map(|(min, _)| min),
            salary_max: salary.map(|(_, max)| max),
            salary_currency: Some("ZAR".to_string()),
            job_type: Some(JobType::FullTime),
            job_level: Some(government_job_level(&title)),
            remote_type: None,
            source: Some(SourceTag::Government),
            source_name: Some(portal.name.clone()),
            source_url,
            skills: Vec::new(),
            benefits: GOVERNMENT_BENEFITS.iter().map(|b| b.to_string()).collect(),
            categories: Vec::new(),
        });
    }

    Ok(jobs)
}

fn select_text(row: &ElementRef<'_>, selector: &str) -> Option<String> {
    let parsed = Selector::parse(selector).ok()?;
    let text: String = row
        .select(&parsed)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn select_href(row: &ElementRef<'_>, selector: &str) -> Option<String> {
    let parsed = Selector::parse(selector).ok()?;
    row.select(&parsed)
        .find_map(|el| el.value().attr("href"))
        .map(str::to_string)
}

fn resolve_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http") {
        return href.to_string();
    }
    match url::Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => format!("{}/{}", base_url.trim_end_matches('/'), href.trim_start_matches('/')),
    }
}

/// Estimate an annual ZAR salary band from a portal's level/grade text.
/// A numeric level maps through the salary scales; common rank words are
/// the fallback.
pub fn estimate_salary_from_level(level_text: &str) -> Option<(f64, f64)> {
    let digits: String = level_text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if let Ok(level) = digits.parse::<u32>() {
        for (lo, hi, min, max) in SALARY_SCALES {
            if (*lo..=*hi).contains(&level) {
                return Some((*min, *max));
            }
        }
    }

    let lower = level_text.to_lowercase();
    if lower.contains("director") || lower.contains("chief") {
        Some((1_200_000.0, 2_000_000.0))
    } else if lower.contains("manager") || lower.contains("senior") {
        Some((700_000.0, 1_200_000.0))
    } else if lower.contains("professional") || lower.contains("specialist") {
        Some((400_000.0, 700_000.0))
    } else if lower.contains("admin") || lower.contains("officer") {
        Some((200_000.0, 400_000.0))
    } else if lower.contains("assistant") || lower.contains("clerk") {
        Some((100_000.0, 200_000.0))
    } else {
        None
    }
}

/// Public-sector titles use their own rank ladder; "officer" and
/// "administrator" are mid-level here, unlike the generic mapping.
pub fn government_job_level(title: &str) -> JobLevel {
    let title = title.to_lowercase();
    let has = |terms: &[&str]| terms.iter().any(|t| title.contains(t));

    if has(&["director general", "deputy director general", "chief"]) {
        JobLevel::CSuite
    } else if has(&["director", "head of"]) {
        JobLevel::Director
    } else if has(&["manager", "supervisor"]) {
        JobLevel::Manager
    } else if has(&["senior", "specialist", "principal"]) {
        JobLevel::Senior
    } else if has(&["junior", "assistant", "intern", "graduate"]) {
        JobLevel::Entry
    } else {
        JobLevel::Mid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::catalog::SelectorProfile;

    fn portal() -> PortalConfig {
        PortalConfig {
            id: "test-portal".into(),
            name: "National Treasury".into(),
            base_url: "https://www.treasury.gov.za".into(),
            listings_url: "https://www.treasury.gov.za/jobs/".into(),
            default_location: "Pretoria, Gauteng".into(),
            academic: false,
            selectors: SelectorProfile {
                job_list: ".vacancy".into(),
                title: ".title".into(),
                department: Some(".dept".into()),
                location: Some(".location".into()),
                closing_date: None,
                level: Some(".level".into()),
                link: Some("a".into()),
            },
        }
    }

    const PAGE: &str = r#"
        <html><body>
          <div class="vacancy">
            <span class="title">Senior Manager: Budget Office</span>
            <span class="dept">Budget Office</span>
            <span class="level">Level 12</span>
            <a href="/jobs/123">view</a>
          </div>
          <div class="vacancy">
            <span class="title">Admin Clerk</span>
            <span class="level">Level 2</span>
          </div>
          <div class="vacancy">
            <span class="dept">No title row</span>
          </div>
        </body></html>"#;

    #[test]
    fn parses_rows_with_selector_profile() {
        let jobs = parse_portal(PAGE, &portal()).unwrap();
        assert_eq!(jobs.len(), 2, "rows without a title are skipped");

        let senior = &jobs[0];
        assert_eq!(senior.title, "Senior Manager: Budget Office");
        assert_eq!(senior.company_name.as_deref(), Some("National Treasury"));
        assert_eq!(senior.company_type, Some(CompanyType::Government));
        assert_eq!(senior.job_level, Some(JobLevel::Manager));
        assert_eq!(senior.salary_min, Some(700_000.0));
        assert_eq!(senior.salary_max, Some(1_200_000.0));
        assert_eq!(senior.salary_currency.as_deref(), Some("ZAR"));
        assert_eq!(
            senior.source_url.as_deref(),
            Some("https://www.treasury.gov.za/jobs/123")
        );
        assert_eq!(senior.benefits.len(), GOVERNMENT_BENEFITS.len());
    }

    #[test]
    fn default_location_applies_when_selector_misses() {
        let jobs = parse_portal(PAGE, &portal()).unwrap();
        assert_eq!(jobs[1].location.as_deref(), Some("Pretoria, Gauteng"));
    }

    #[test]
    fn salary_scale_bands() {
        assert_eq!(estimate_salary_from_level("Level 2"), Some((100_000.0, 200_000.0)));
        assert_eq!(estimate_salary_from_level("5"), Some((200_000.0, 400_000.0)));
        assert_eq!(estimate_salary_from_level("Grade 8"), Some((400_000.0, 700_000.0)));
        assert_eq!(estimate_salary_from_level("12"), Some((700_000.0, 1_200_000.0)));
        assert_eq!(estimate_salary_from_level("Level 14"), Some((1_200_000.0, 2_000_000.0)));
        assert_eq!(estimate_salary_from_level("16"), Some((2_000_000.0, 3_000_000.0)));
    }

    #[test]
    fn salary_text_fallbacks() {
        assert_eq!(
            estimate_salary_from_level("Senior Management Service"),
            Some((700_000.0, 1_200_000.0))
        );
        assert_eq!(
            estimate_salary_from_level("Clerk post"),
            Some((100_000.0, 200_000.0))
        );
        assert_eq!(estimate_salary_from_level("unknown"), None);
    }

    #[test]
    fn government_rank_ladder() {
        assert_eq!(government_job_level("Director General: Treasury"), JobLevel::CSuite);
        assert_eq!(government_job_level("Director: ICT"), JobLevel::Director);
        assert_eq!(government_job_level("Senior Manager"), JobLevel::Manager);
        assert_eq!(government_job_level("Senior Specialist"), JobLevel::Senior);
        assert_eq!(government_job_level("Assistant Clerk"), JobLevel::Entry);
        assert_eq!(government_job_level("Policy Officer"), JobLevel::Mid);
    }
}
