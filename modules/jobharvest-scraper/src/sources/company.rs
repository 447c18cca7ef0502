//! Company career-page adapter. A fixed employer list, each with a
//! career-page URL and a selector profile; listings become private-sector
//! records attributed to the employer.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use jobharvest_common::{
    detect_job_level, detect_remote_type, AdapterStatus, CompanyType, HarvestError, JobFilter,
    RawJob, SourceResult, SourceTag,
};

use crate::infra::cache::TTL_COMPANY;
use crate::infra::processor::{Priority, RequestProcessor};
use crate::pipeline::score::passes_raw;
use crate::traits::SourceAdapter;

use super::catalog::EmployerConfig;
use super::fetch::fetch_page;

const LEGAL_NOTE: &str = "employers publish career pages for applicants";

pub struct CompanyAdapter {
    employers: Vec<EmployerConfig>,
    processor: Arc<RequestProcessor>,
    status: Mutex<AdapterStatus>,
}

impl CompanyAdapter {
    pub fn new(employers: Vec<EmployerConfig>, processor: Arc<RequestProcessor>) -> Self {
        Self {
            employers,
            processor,
            status: Mutex::new(AdapterStatus::default()),
        }
    }

    async fn scrape_employer(&self, employer: &EmployerConfig) -> Result<Vec<RawJob>, HarvestError> {
        let html = fetch_page(
            &self.processor,
            &employer.career_page_url,
            Some((format!("company:{}", employer.id), TTL_COMPANY)),
            Priority::Low,
        )
        .await?;

        let jobs = parse_career_page(&html, employer)?;
        info!(employer = %employer.id, jobs = jobs.len(), "Parsed career page");
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
impl SourceAdapter for CompanyAdapter {
    fn id(&self) -> &str {
        "company"
    }

    fn tag(&self) -> SourceTag {
        SourceTag::Company
    }

    async fn scrape(&self, filter: &JobFilter) -> Result<SourceResult, HarvestError> {
        let mut jobs = Vec::new();
        let mut errors = 0usize;

        for employer in &self.employers {
            match self.scrape_employer(employer).await {
                Ok(employer_jobs) => {
                    jobs.extend(
                        employer_jobs
                            .into_iter()
                            .filter(|raw| passes_raw(raw, filter)),
                    );
                }
                Err(err) => {
                    errors += 1;
                    warn!(employer = %employer.id, error = %err, "Career page scrape failed");
                }
            }
        }

        info!(
            jobs = jobs.len(),
            errors,
            employers = self.employers.len(),
            "Company scrape complete"
        );
        self.record_run(jobs.len(), errors, self.employers.len());

        Ok(SourceResult {
            jobs,
            source_name: "company_pages".to_string(),
            legal_note: LEGAL_NOTE,
            api_calls_spent: 0,
        })
    }

    fn status(&self) -> AdapterStatus {
        self.status.lock().expect("status lock poisoned").clone()
    }
}

fn parse_career_page(html: &str, employer: &EmployerConfig) -> Result<Vec<RawJob>, HarvestError> {
    let document = Html::parse_document(html);
    let selectors = &employer.selectors;
    let row_selector = Selector::parse(&selectors.job_list)
        .map_err(|err| HarvestError::Parse(format!("bad job_list selector: {err}")))?;

    let mut jobs = Vec::new();
    for row in document.select(&row_selector) {
        let Some(title) = select_text(&row, &selectors.title) else {
            continue;
        };

        let location = selectors
            .location
            .as_deref()
            .and_then(|sel| select_text(&row, sel));
        let source_url = selectors
            .link
            .as_deref()
            .and_then(|sel| select_href(&row, sel))
            .map(|href| resolve_url(&href, &employer.career_page_url));

        jobs.push(RawJob {
            title: title.clone(),
            description: None,
            company_name: Some(employer.name.clone()),
            company_type: Some(CompanyType::Private),
            location,
            posted_date: None,
            salary_min: None,
            salary_max: None,
            salary_currency: None,
            job_type: None,
            job_level: Some(detect_job_level(&title)),
            remote_type: Some(detect_remote_type(&title)),
            source: Some(SourceTag::Company),
            source_name: Some(employer.name.clone()),
            source_url,
            skills: Vec::new(),
            benefits: Vec::new(),
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
        Err(_) => href.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::catalog::SelectorProfile;
    use jobharvest_common::JobLevel;

    fn employer() -> EmployerConfig {
        EmployerConfig {
            id: "capitec".into(),
            name: "Capitec".into(),
            career_page_url: "https://www.capitecbank.co.za/about-us/careers/".into(),
            selectors: SelectorProfile {
                job_list: ".job-item".into(),
                title: ".job-title".into(),
                department: None,
                location: Some(".location".into()),
                closing_date: None,
                level: None,
                link: Some("a".into()),
            },
        }
    }

    const PAGE: &str = r#"
        <html><body>
          <div class="job-item">
            <span class="job-title">Senior Software Engineer</span>
            <span class="location">Stellenbosch, Western Cape</span>
            <a href="/vacancies/42">apply</a>
          </div>
          <div class="job-item"><span class="location">orphan row</span></div>
        </body></html>"#;

    #[test]
    fn parses_listings_as_private_sector() {
        let jobs = parse_career_page(PAGE, &employer()).unwrap();
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.title, "Senior Software Engineer");
        assert_eq!(job.company_name.as_deref(), Some("Capitec"));
        assert_eq!(job.company_type, Some(CompanyType::Private));
        assert_eq!(job.job_level, Some(JobLevel::Senior));
        assert_eq!(job.location.as_deref(), Some("Stellenbosch, Western Cape"));
        assert_eq!(
            job.source_url.as_deref(),
            Some("https://www.capitecbank.co.za/vacancies/42")
        );
    }
}
