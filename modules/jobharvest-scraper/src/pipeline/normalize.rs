//! Canonicalization of adapter output into the Job schema.
//!
//! The normalizer is the only component that mutates job records: it
//! assigns the identity, fills defaults, and enforces the schema
//! invariants. Records that cannot be repaired are rejected with
//! `HarvestError::InvalidRecord` and counted by the caller.

use chrono::{DateTime, Utc};
use tracing::debug;

use jobharvest_common::{
    detect_job_level, detect_job_type, detect_remote_type, extract_skills, strip_html,
    truncate_chars, Company, HarvestError, Job, JobType, RawJob,
};

use super::identity::identity;

const DESCRIPTION_MAX_CHARS: usize = 2000;
const DEFAULT_LOCATION: &str = "South Africa";
const DEFAULT_CURRENCY: &str = "ZAR";

/// Canonicalize one raw record. `scraped_at` is stamped by the caller so
/// a batch shares one instant.
pub fn normalize(raw: RawJob, scraped_at: DateTime<Utc>) -> Result<Job, HarvestError> {
    let title = raw.title.trim().to_string();
    if title.is_empty() {
        return Err(HarvestError::InvalidRecord("empty title".to_string()));
    }

    let company_name = raw
        .company_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if company_name.is_empty() {
        return Err(HarvestError::InvalidRecord(format!(
            "empty company for '{title}'"
        )));
    }

    let source = raw
        .source
        .ok_or_else(|| HarvestError::InvalidRecord(format!("missing source for '{title}'")))?;

    let description = truncate_chars(
        strip_html(raw.description.as_deref().unwrap_or_default()).as_str(),
        DESCRIPTION_MAX_CHARS,
    );

    let location = raw
        .location
        .as_deref()
        .map(str::trim)
        .filter(|loc| !loc.is_empty())
        .unwrap_or(DEFAULT_LOCATION)
        .to_string();

    // posted_date may never exceed scraped_at; feed clock skew is clamped.
    let posted_date = match raw.posted_date {
        Some(posted) if posted <= scraped_at => posted,
        Some(posted) => {
            debug!(%posted, %scraped_at, title, "Clamping future posted_date");
            scraped_at
        }
        None => scraped_at,
    };

    // An inverted salary range is a parse artifact; drop both bounds.
    let (salary_min, salary_max) = match (raw.salary_min, raw.salary_max) {
        (Some(min), Some(max)) if min > max => {
            debug!(min, max, title, "Dropping inverted salary range");
            (None, None)
        }
        other => other,
    };

    let text = format!("{title} {description}");
    let job_level = raw.job_level.unwrap_or_else(|| detect_job_level(&text));
    let remote_type = raw.remote_type.unwrap_or_else(|| detect_remote_type(&text));
    let job_type = raw.job_type.unwrap_or_else(|| {
        if raw.categories.is_empty() {
            JobType::FullTime
        } else {
            detect_job_type(&raw.categories)
        }
    });

    let skills = if raw.skills.is_empty() {
        extract_skills(&description)
    } else {
        raw.skills
    };

    let id = identity(&title, &company_name, &location);
    let source_name = raw
        .source_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| source.as_str().to_string());

    Ok(Job {
        id,
        title,
        description,
        company: Company {
            name: company_name,
            company_type: raw.company_type,
        },
        location,
        posted_date,
        scraped_at,
        salary_min,
        salary_max,
        salary_currency: raw
            .salary_currency
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        job_type,
        job_level,
        remote_type,
        source,
        source_name,
        source_url: raw.source_url.filter(|url| !url.is_empty()),
        skills,
        benefits: raw.benefits,
        match_score: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jobharvest_common::{JobLevel, SourceTag};

    fn raw(title: &str, company: &str) -> RawJob {
        RawJob {
            title: title.to_string(),
            company_name: Some(company.to_string()),
            source: Some(SourceTag::Rss),
            ..Default::default()
        }
    }

    #[test]
    fn fills_defaults() {
        let job = normalize(raw("Senior Developer", "ACME"), Utc::now()).unwrap();
        assert_eq!(job.location, "South Africa");
        assert_eq!(job.salary_currency, "ZAR");
        assert_eq!(job.job_level, JobLevel::Senior);
        assert_eq!(job.posted_date, job.scraped_at);
        assert_eq!(job.source_name, "rss");
        assert_eq!(job.id.len(), 16);
    }

    #[test]
    fn rejects_empty_title() {
        let err = normalize(raw("   ", "ACME"), Utc::now()).unwrap_err();
        assert!(matches!(err, HarvestError::InvalidRecord(_)));
    }

    #[test]
    fn rejects_empty_company() {
        let err = normalize(raw("Engineer", " "), Utc::now()).unwrap_err();
        assert!(matches!(err, HarvestError::InvalidRecord(_)));
    }

    #[test]
    fn rejects_missing_source() {
        let mut record = raw("Engineer", "ACME");
        record.source = None;
        let err = normalize(record, Utc::now()).unwrap_err();
        assert!(matches!(err, HarvestError::InvalidRecord(_)));
    }

    #[test]
    fn clamps_future_posted_date() {
        let now = Utc::now();
        let mut record = raw("Engineer", "ACME");
        record.posted_date = Some(now + Duration::days(2));
        let job = normalize(record, now).unwrap();
        assert_eq!(job.posted_date, now);
    }

    #[test]
    fn drops_inverted_salary_range() {
        let mut record = raw("Engineer", "ACME");
        record.salary_min = Some(500_000.0);
        record.salary_max = Some(300_000.0);
        let job = normalize(record, Utc::now()).unwrap();
        assert_eq!(job.salary_min, None);
        assert_eq!(job.salary_max, None);
    }

    #[test]
    fn strips_html_and_truncates_description() {
        let mut record = raw("Engineer", "ACME");
        record.description = Some(format!("<p>{}</p>", "x".repeat(3000)));
        let job = normalize(record, Utc::now()).unwrap();
        assert_eq!(job.description.chars().count(), 2000);
        assert!(!job.description.contains('<'));
    }

    #[test]
    fn identity_collapses_case_variants() {
        let a = normalize(raw("  Senior Engineer ", "ACME"), Utc::now()).unwrap();
        let b = normalize(raw("Senior Engineer", "Acme"), Utc::now()).unwrap();
        assert_eq!(a.id, b.id);
    }
}
