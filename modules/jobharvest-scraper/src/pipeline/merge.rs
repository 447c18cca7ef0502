//! Cross-source merge for records with equal identity.
//!
//! The surviving record keeps the most specific non-empty value for each
//! field. Source attribution follows the priority serpapi > government >
//! rss > company; `source_url` is taken from whichever side has one.

use jobharvest_common::Job;

/// Merge two records with the same identity into one. The higher-priority
/// source becomes the base; gaps are filled from the other record.
pub fn merge(a: Job, b: Job) -> Job {
    debug_assert_eq!(a.id, b.id, "merge requires equal identity");

    let (mut base, other) = if a.source.merge_rank() >= b.source.merge_rank() {
        (a, b)
    } else {
        (b, a)
    };

    if base.description.len() < other.description.len() {
        base.description = other.description;
    }
    if base.company.company_type.is_none() {
        base.company.company_type = other.company.company_type;
    }

    // Keep the original posting instant, which is the earlier one.
    if other.posted_date < base.posted_date {
        base.posted_date = other.posted_date;
    }

    if base.salary_min.is_none() {
        base.salary_min = other.salary_min;
    }
    if base.salary_max.is_none() {
        base.salary_max = other.salary_max;
    }

    if base.source_url.is_none() {
        base.source_url = other.source_url;
    }

    for skill in other.skills {
        if !base.skills.contains(&skill) {
            base.skills.push(skill);
        }
    }
    for benefit in other.benefits {
        if !base.benefits.contains(&benefit) {
            base.benefits.push(benefit);
        }
    }

    base.match_score = match (base.match_score, other.match_score) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    };

    base
}
