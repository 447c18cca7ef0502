//! Filter evaluation and match scoring.
//!
//! `passes_*` is a conjunction over every provided predicate; absent
//! predicates always pass. `match_score` is the 0–100 rubric: 40%
//! keyword coverage, 30% location, 30% job level, normalized to the
//! predicates actually supplied. Government-typed jobs use a distinct
//! weighting that starts from a base of 50.

use jobharvest_common::{CompanyType, Job, JobFilter, JobLevel, RawJob, RemoteType};

const NO_FILTER_SCORE: f64 = 50.0;

/// The fields filter evaluation needs, projected from either a raw or a
/// normalized record so adapters and the pipeline share one rule set.
struct FilterView<'a> {
    text: String,
    location: Option<&'a str>,
    remote_type: Option<RemoteType>,
    job_level: Option<JobLevel>,
    salary_min: Option<f64>,
    company_type: Option<CompanyType>,
    skills: &'a [String],
}

impl<'a> FilterView<'a> {
    fn from_job(job: &'a Job) -> Self {
        Self {
            text: format!("{} {}", job.title, job.description).to_lowercase(),
            location: Some(job.location.as_str()),
            remote_type: Some(job.remote_type),
            job_level: Some(job.job_level),
            salary_min: job.salary_min,
            company_type: job.company.company_type,
            skills: &job.skills,
        }
    }

    fn from_raw(raw: &'a RawJob) -> Self {
        Self {
            text: format!(
                "{} {}",
                raw.title,
                raw.description.as_deref().unwrap_or_default()
            )
            .to_lowercase(),
            location: raw.location.as_deref(),
            remote_type: raw.remote_type,
            job_level: raw.job_level,
            salary_min: raw.salary_min,
            company_type: raw.company_type,
            skills: &raw.skills,
        }
    }
}

pub fn passes_filter(job: &Job, filter: &JobFilter) -> bool {
    passes(&FilterView::from_job(job), filter)
}

/// Raw-record variant used by adapters so filtered-out records never
/// appear in a `SourceResult`.
pub fn passes_raw(raw: &RawJob, filter: &JobFilter) -> bool {
    passes(&FilterView::from_raw(raw), filter)
}

fn passes(view: &FilterView<'_>, filter: &JobFilter) -> bool {
    if filter.is_empty() {
        return true;
    }

    if !filter.keywords.is_empty() {
        let any_match = filter
            .keywords
            .iter()
            .any(|keyword| view.text.contains(&keyword.to_lowercase()));
        if !any_match {
            return false;
        }
    }

    if let Some(wanted) = &filter.location {
        let matches_location = view
            .location
            .map(|loc| loc.to_lowercase().contains(&wanted.to_lowercase()))
            .unwrap_or(false);
        // Remote-friendly jobs satisfy the location predicate implicitly.
        let remote = view.remote_type == Some(RemoteType::Remote);
        if !matches_location && !remote {
            return false;
        }
    }

    if let Some(level) = filter.job_level {
        if view.job_level != Some(level) {
            return false;
        }
    }

    if let Some(min) = filter.min_salary {
        // Unknown salaries pass; a known floor below the asked minimum fails.
        if let Some(salary) = view.salary_min {
            if salary < min {
                return false;
            }
        }
    }

    if let Some(industry) = &filter.industry {
        let needle = industry.to_lowercase();
        let in_text = view.text.contains(&needle);
        let in_skills = view
            .skills
            .iter()
            .any(|skill| skill.to_lowercase().contains(&needle));
        if !in_text && !in_skills {
            return false;
        }
    }

    if filter.government_only && view.company_type != Some(CompanyType::Government) {
        return false;
    }

    if filter.academic_only && view.company_type != Some(CompanyType::Academic) {
        return false;
    }

    true
}

/// Score a job against a filter on the 0–100 rubric.
pub fn match_score(job: &Job, filter: &JobFilter) -> f64 {
    let view = FilterView::from_job(job);

    if job.company.company_type == Some(CompanyType::Government) {
        return government_score(&view, filter);
    }

    let mut score = 0.0;
    let mut max_score = 0.0;

    if !filter.keywords.is_empty() {
        max_score += 40.0;
        score += keyword_coverage(&view, filter) * 40.0;
    }

    if let Some(wanted) = &filter.location {
        max_score += 30.0;
        score += location_credit(&view, wanted, 30.0, 20.0);
    }

    if let Some(level) = filter.job_level {
        max_score += 30.0;
        if view.job_level == Some(level) {
            score += 30.0;
        }
    }

    if max_score == 0.0 {
        return NO_FILTER_SCORE;
    }
    ((score / max_score) * 100.0 * 100.0).round() / 100.0
}

/// Government jobs carry stable public-sector value regardless of filter
/// fit, so they start from a base of 50 with smaller adjustments.
fn government_score(view: &FilterView<'_>, filter: &JobFilter) -> f64 {
    let mut score = 50.0;

    if !filter.keywords.is_empty() {
        score += keyword_coverage(view, filter) * 25.0;
    }
    if let Some(wanted) = &filter.location {
        score += location_credit(view, wanted, 15.0, 10.0);
    }
    if let Some(level) = filter.job_level {
        if view.job_level == Some(level) {
            score += 10.0;
        }
    }

    score.clamp(0.0, 100.0)
}

fn keyword_coverage(view: &FilterView<'_>, filter: &JobFilter) -> f64 {
    if filter.keywords.is_empty() {
        return 0.0;
    }
    let matches = filter
        .keywords
        .iter()
        .filter(|keyword| view.text.contains(&keyword.to_lowercase()))
        .count();
    matches as f64 / filter.keywords.len() as f64
}

fn location_credit(view: &FilterView<'_>, wanted: &str, full: f64, remote: f64) -> f64 {
    let matched = view
        .location
        .map(|loc| loc.to_lowercase().contains(&wanted.to_lowercase()))
        .unwrap_or(false);
    if matched {
        full
    } else if view.remote_type == Some(RemoteType::Remote) {
        remote
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jobharvest_common::{Company, JobType, SourceTag};

    fn job(title: &str, description: &str, location: &str) -> Job {
        Job {
            id: "0123456789abcdef".to_string(),
            title: title.to_string(),
            description: description.to_string(),
            company: Company {
                name: "ACME".to_string(),
                company_type: None,
            },
            location: location.to_string(),
            posted_date: Utc::now(),
            scraped_at: Utc::now(),
            salary_min: None,
            salary_max: None,
            salary_currency: "ZAR".to_string(),
            job_type: JobType::FullTime,
            job_level: JobLevel::Mid,
            remote_type: RemoteType::Onsite,
            source: SourceTag::Rss,
            source_name: "Careers24".to_string(),
            source_url: None,
            skills: vec![],
            benefits: vec![],
            match_score: None,
        }
    }

    #[test]
    fn empty_filter_passes_and_scores_fifty() {
        let j = job("Engineer", "builds things", "Cape Town");
        let f = JobFilter::default();
        assert!(passes_filter(&j, &f));
        assert_eq!(match_score(&j, &f), 50.0);
    }

    #[test]
    fn keyword_filter_is_an_or() {
        let j = job("Rust Engineer", "systems work", "Cape Town");
        let f = JobFilter {
            keywords: vec!["python".into(), "rust".into()],
            ..Default::default()
        };
        assert!(passes_filter(&j, &f));
    }

    #[test]
    fn keyword_miss_fails() {
        let j = job("Rust Engineer", "systems work", "Cape Town");
        let f = JobFilter {
            keywords: vec!["accountant".into()],
            ..Default::default()
        };
        assert!(!passes_filter(&j, &f));
    }

    #[test]
    fn remote_satisfies_location_implicitly() {
        let mut j = job("Engineer", "", "Johannesburg");
        j.remote_type = RemoteType::Remote;
        let f = JobFilter {
            location: Some("Cape Town".into()),
            ..Default::default()
        };
        assert!(passes_filter(&j, &f));
    }

    #[test]
    fn unknown_salary_passes_min_salary() {
        let j = job("Engineer", "", "Cape Town");
        let f = JobFilter {
            min_salary: Some(500_000.0),
            ..Default::default()
        };
        assert!(passes_filter(&j, &f));

        let mut low = job("Engineer", "", "Cape Town");
        low.salary_min = Some(200_000.0);
        assert!(!passes_filter(&low, &f));
    }

    #[test]
    fn government_only_requires_company_type() {
        let j = job("Officer", "", "Pretoria");
        let f = JobFilter {
            government_only: true,
            ..Default::default()
        };
        assert!(!passes_filter(&j, &f));

        let mut gov = job("Officer", "", "Pretoria");
        gov.company.company_type = Some(CompanyType::Government);
        assert!(passes_filter(&gov, &f));
    }

    #[test]
    fn score_full_match_is_one_hundred() {
        let mut j = job("Rust Engineer", "rust systems", "Cape Town");
        j.job_level = JobLevel::Senior;
        let f = JobFilter {
            keywords: vec!["rust".into()],
            location: Some("Cape Town".into()),
            job_level: Some(JobLevel::Senior),
            ..Default::default()
        };
        assert_eq!(match_score(&j, &f), 100.0);
    }

    #[test]
    fn score_partial_keywords() {
        let j = job("Rust Engineer", "systems", "Cape Town");
        let f = JobFilter {
            keywords: vec!["rust".into(), "python".into()],
            ..Default::default()
        };
        // 1 of 2 keywords over a 40-point component, renormalized to 100.
        assert_eq!(match_score(&j, &f), 50.0);
    }

    #[test]
    fn score_remote_gets_partial_location_credit() {
        let mut j = job("Engineer", "", "Johannesburg");
        j.remote_type = RemoteType::Remote;
        let f = JobFilter {
            location: Some("Cape Town".into()),
            ..Default::default()
        };
        // 20 of 30 points, renormalized.
        assert!((match_score(&j, &f) - 66.67).abs() < 0.01);
    }

    #[test]
    fn government_score_starts_at_base() {
        let mut j = job("Admin Officer", "", "Pretoria");
        j.company.company_type = Some(CompanyType::Government);
        let f = JobFilter::default();
        assert_eq!(match_score(&j, &f), 50.0);

        let scored = match_score(
            &j,
            &JobFilter {
                location: Some("Pretoria".into()),
                ..Default::default()
            },
        );
        assert_eq!(scored, 65.0);
    }

    #[test]
    fn scores_stay_in_bounds() {
        let cases = [
            job("Engineer", "rust python sql", "Cape Town"),
            job("CEO", "", "Remote"),
            job("x", "", ""),
        ];
        let filters = [
            JobFilter::default(),
            JobFilter {
                keywords: vec!["rust".into(), "python".into(), "sql".into()],
                location: Some("cape town".into()),
                job_level: Some(JobLevel::Mid),
                ..Default::default()
            },
        ];
        for j in &cases {
            for f in &filters {
                let score = match_score(j, f);
                assert!((0.0..=100.0).contains(&score), "score {score} out of bounds");
            }
        }
    }
}
