//! Text extraction heuristics shared by every adapter: HTML stripping,
//! ZAR salary parsing, job-level / remote-type / job-type detection,
//! South African location matching, and company-name heuristics.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{JobLevel, JobType, RemoteType};

/// Closed set of South African cities and provinces recognised by the
/// location heuristic. Matching is case-insensitive substring.
pub const SA_LOCATIONS: &[&str] = &[
    "johannesburg",
    "cape town",
    "durban",
    "pretoria",
    "port elizabeth",
    "gqeberha",
    "bloemfontein",
    "nelspruit",
    "polokwane",
    "kimberley",
    "east london",
    "rustenburg",
    "gauteng",
    "western cape",
    "kwazulu-natal",
    "eastern cape",
    "free state",
    "limpopo",
    "mpumalanga",
    "north west",
    "northern cape",
    "south africa",
    "remote",
];

/// Fixed skill lexicon matched against descriptions (substring,
/// case-insensitive). Deliberately small; enrichment beyond this is out
/// of scope for the core.
const SKILL_LEXICON: &[&str] = &[
    "python",
    "java",
    "javascript",
    "typescript",
    "c#",
    "sql",
    "excel",
    "aws",
    "azure",
    "docker",
    "kubernetes",
    "react",
    "angular",
    "linux",
    "sap",
    "accounting",
    "project management",
    "data analysis",
    "customer service",
    "sales",
    "marketing",
    "nursing",
    "teaching",
    "engineering",
];

const MAX_SKILLS: usize = 10;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("Invalid tag regex"));

static RAND_AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:R|ZAR)\s*([0-9][0-9,\s]*)\s*(k)?(?:\s*(?:-|–|to)\s*(?:R|ZAR)?\s*([0-9][0-9,\s]*)\s*(k)?)?",
    )
    .expect("Invalid rand amount regex")
});

static PER_PERIOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([0-9][0-9,\s]*)\s*per\s+(month|annum|year)")
        .expect("Invalid per-period regex")
});

static COMPANY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?:\bat|@)\s+([A-Z][A-Za-z&\s]{2,60}?)(?:\s+(?:is|are|seeks)\b|\s*$)")
            .expect("Invalid company pattern"),
        Regex::new(r"([A-Z][A-Za-z&\s]{2,60}?)\s+(?:is\s+)?(?:hiring|looking|seeking)")
            .expect("Invalid company pattern"),
        Regex::new(r"^([A-Z][A-Za-z&\s]{2,60}?)\s*[-–]\s*").expect("Invalid company pattern"),
    ]
});

/// Strip HTML tags, decode the common entities, and collapse blank lines.
/// Callers truncate to their own bounds afterwards.
pub fn strip_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let no_tags = TAG_RE.replace_all(text, " ");
    let decoded = no_tags
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

/// A parsed salary range in ZAR. Amounts qualified "per month" are
/// annualised so comparison fields are always yearly figures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalaryRange {
    pub min: f64,
    pub max: Option<f64>,
}

/// Parse ZAR-style salary text: `R 15,000`, `R15k - R20k`,
/// `ZAR 300,000`, `25 000 per month`, `450000 per annum`.
pub fn parse_salary(text: &str) -> Option<SalaryRange> {
    let monthly = text.to_lowercase().contains("per month");
    let annualise = |amount: f64| if monthly { amount * 12.0 } else { amount };

    if let Some(caps) = RAND_AMOUNT_RE.captures(text) {
        let min = parse_amount(caps.get(1)?.as_str(), caps.get(2).is_some())?;
        let max = caps
            .get(3)
            .and_then(|m| parse_amount(m.as_str(), caps.get(4).is_some()));
        return Some(SalaryRange {
            min: annualise(min),
            max: max.map(annualise),
        });
    }

    if let Some(caps) = PER_PERIOD_RE.captures(text) {
        let amount = parse_amount(caps.get(1)?.as_str(), false)?;
        let yearly = match caps.get(2)?.as_str().to_lowercase().as_str() {
            "month" => amount * 12.0,
            _ => amount,
        };
        return Some(SalaryRange {
            min: yearly,
            max: None,
        });
    }

    None
}

fn parse_amount(digits: &str, thousands: bool) -> Option<f64> {
    let cleaned: String = digits.chars().filter(|c| c.is_ascii_digit()).collect();
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    Some(if thousands { value * 1000.0 } else { value })
}

/// Detect job level from free text using the closed keyword mapping.
pub fn detect_job_level(text: &str) -> JobLevel {
    let text = text.to_lowercase();
    let has = |terms: &[&str]| terms.iter().any(|t| text.contains(t));

    if has(&["ceo", "cto", "cfo", "chief"]) {
        JobLevel::CSuite
    } else if has(&["director", "vp", "vice president"]) {
        JobLevel::Director
    } else if has(&["manager", "head of", "lead"]) {
        JobLevel::Manager
    } else if has(&["senior", "sr.", "principal"]) {
        JobLevel::Senior
    } else if has(&["junior", "jr.", "entry", "graduate", "intern"]) {
        JobLevel::Entry
    } else {
        JobLevel::Mid
    }
}

/// Detect remote arrangement. "hybrid" wins over a plain remote mention.
pub fn detect_remote_type(text: &str) -> RemoteType {
    let text = text.to_lowercase();
    if ["remote", "work from home", "wfh"]
        .iter()
        .any(|t| text.contains(t))
    {
        if text.contains("hybrid") {
            RemoteType::Hybrid
        } else {
            RemoteType::Remote
        }
    } else if text.contains("hybrid") {
        RemoteType::Hybrid
    } else {
        RemoteType::Onsite
    }
}

/// Determine job type from feed categories/tags. Defaults to full-time.
pub fn detect_job_type(categories: &[String]) -> JobType {
    let lowered: Vec<String> = categories.iter().map(|c| c.to_lowercase()).collect();
    let any = |pred: fn(&str) -> bool| lowered.iter().any(|c| pred(c.as_str()));

    if any(|c| c.contains("full") || c.contains("permanent")) {
        JobType::FullTime
    } else if any(|c| c.contains("part")) {
        JobType::PartTime
    } else if any(|c| c.contains("contract")) {
        JobType::Contract
    } else if any(|c| c.contains("temp")) {
        JobType::Temporary
    } else if any(|c| c.contains("intern")) {
        JobType::Internship
    } else {
        JobType::FullTime
    }
}

/// Match text against the closed SA location set. Returns up to two
/// matches title-cased and comma-joined, or None.
pub fn extract_location(text: &str) -> Option<String> {
    let text = text.to_lowercase();
    let found: Vec<String> = SA_LOCATIONS
        .iter()
        .filter(|loc| text.contains(*loc))
        .take(2)
        .map(|loc| title_case(loc))
        .collect();

    if found.is_empty() {
        None
    } else {
        Some(found.join(", "))
    }
}

/// Heuristic company-name extraction. The title alone is tried first
/// (it has far less noise), then title + summary. Accepts matches of
/// length 4–49 after trimming.
pub fn extract_company(title: &str, summary: &str) -> Option<String> {
    find_company(title).or_else(|| find_company(&format!("{title} {summary}")))
}

fn find_company(text: &str) -> Option<String> {
    for pattern in COMPANY_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            let candidate = caps.get(1)?.as_str().trim();
            if (4..=49).contains(&candidate.len()) {
                return Some(candidate.to_string());
            }
        }
    }
    None
}

/// Extract known skills from a description. Deduplicated, capped at 10.
pub fn extract_skills(description: &str) -> Vec<String> {
    let text = description.to_lowercase();
    SKILL_LEXICON
        .iter()
        .filter(|skill| text.contains(*skill))
        .take(MAX_SKILLS)
        .map(|s| s.to_string())
        .collect()
}

fn title_case(value: &str) -> String {
    value
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
