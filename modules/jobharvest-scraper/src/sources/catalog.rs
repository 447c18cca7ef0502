//! Built-in source catalogs: RSS feed groups, government portals, and
//! company career pages. These are defaults; deployments override them
//! through configuration; nothing here is baked into the adapters.

use serde::{Deserialize, Serialize};

/// Scrape cadence class for an RSS feed group. High-priority groups run
/// in most slots, low-priority groups only in the late sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssSourceConfig {
    pub id: String,
    pub source_name: String,
    pub priority: FeedPriority,
    pub feeds: Vec<String>,
}

/// Declarative CSS-selector profile for one listings page. Each field is
/// a selector list ("a, b" alternatives; first match wins). Optional
/// fields absent from a portal's markup are simply skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorProfile {
    pub job_list: String,
    pub title: String,
    pub department: Option<String>,
    pub location: Option<String>,
    pub closing_date: Option<String>,
    pub level: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub listings_url: String,
    /// Used when the portal's markup carries no location column.
    pub default_location: String,
    /// University portals emit academic rather than government records.
    pub academic: bool,
    pub selectors: SelectorProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployerConfig {
    pub id: String,
    pub name: String,
    pub career_page_url: String,
    pub selectors: SelectorProfile,
}

/// Default South African job-board feed groups.
pub fn default_rss_sources() -> Vec<RssSourceConfig> {
    vec![
        RssSourceConfig {
            id: "careers24".into(),
            source_name: "Careers24".into(),
            priority: FeedPriority::High,
            feeds: vec![
                "https://www.careers24.com/rss/jobs".into(),
                "https://www.careers24.com/rss/jobs/gauteng".into(),
                "https://www.careers24.com/rss/jobs/western-cape".into(),
                "https://www.careers24.com/rss/jobs/kwazulu-natal".into(),
                "https://www.careers24.com/rss/jobs/eastern-cape".into(),
                "https://www.careers24.com/rss/jobs/free-state".into(),
                "https://www.careers24.com/rss/jobs/mpumalanga".into(),
                "https://www.careers24.com/rss/jobs/northern-cape".into(),
                "https://www.careers24.com/rss/jobs/north-west".into(),
                "https://www.careers24.com/rss/jobs/limpopo".into(),
            ],
        },
        RssSourceConfig {
            id: "indeed-rss".into(),
            source_name: "Indeed SA".into(),
            priority: FeedPriority::High,
            feeds: vec![
                "https://za.indeed.com/rss?q=&l=South+Africa".into(),
                "https://za.indeed.com/rss?q=developer&l=Cape+Town".into(),
                "https://za.indeed.com/rss?q=engineer&l=Johannesburg".into(),
                "https://za.indeed.com/rss?q=manager&l=Durban".into(),
            ],
        },
        RssSourceConfig {
            id: "jobmail".into(),
            source_name: "JobMail".into(),
            priority: FeedPriority::Medium,
            feeds: vec![
                "https://www.jobmail.co.za/rss/jobs.xml".into(),
                "https://www.jobmail.co.za/rss/jobs/gauteng.xml".into(),
                "https://www.jobmail.co.za/rss/jobs/western-cape.xml".into(),
                "https://www.jobmail.co.za/rss/jobs/kzn.xml".into(),
            ],
        },
        RssSourceConfig {
            id: "pnet".into(),
            source_name: "PNet".into(),
            priority: FeedPriority::Medium,
            feeds: vec![
                "https://www.pnet.co.za/feeds/jobs.xml".into(),
                "https://www.pnet.co.za/feeds/jobs/information-technology.xml".into(),
                "https://www.pnet.co.za/feeds/jobs/finance.xml".into(),
                "https://www.pnet.co.za/feeds/jobs/engineering.xml".into(),
            ],
        },
        RssSourceConfig {
            id: "gov-feeds".into(),
            source_name: "Government".into(),
            priority: FeedPriority::Low,
            feeds: vec![
                "https://www.dpsa.gov.za/feeds/vacancies.xml".into(),
                "https://www.gov.za/feeds/jobs.xml".into(),
            ],
        },
    ]
}

/// Default public-portal profiles. All listings here are public-domain
/// government or university information.
pub fn default_portals() -> Vec<PortalConfig> {
    vec![
        PortalConfig {
            id: "dpsa".into(),
            name: "Department of Public Service & Administration".into(),
            base_url: "https://www.dpsa.gov.za".into(),
            listings_url: "https://www.dpsa.gov.za/vacancies.php".into(),
            default_location: "South Africa".into(),
            academic: false,
            selectors: SelectorProfile {
                job_list: ".vacancy-item, .job-listing, table tr".into(),
                title: ".job-title, td:nth-child(1), h3".into(),
                department: Some(".department, td:nth-child(2)".into()),
                location: Some(".location, td:nth-child(3)".into()),
                closing_date: Some(".closing-date, td:nth-child(4)".into()),
                level: Some(".level, .grade".into()),
                link: Some("a[href*='vacancy'], a[href*='job']".into()),
            },
        },
        PortalConfig {
            id: "national-treasury".into(),
            name: "National Treasury".into(),
            base_url: "https://www.treasury.gov.za".into(),
            listings_url: "https://www.treasury.gov.za/jobs/".into(),
            default_location: "Pretoria, Gauteng".into(),
            academic: false,
            selectors: SelectorProfile {
                job_list: ".job-item, .vacancy".into(),
                title: ".title, h3".into(),
                department: None,
                location: Some(".location".into()),
                closing_date: None,
                level: Some(".level, .grade".into()),
                link: Some("a".into()),
            },
        },
        PortalConfig {
            id: "city-of-cape-town".into(),
            name: "City of Cape Town".into(),
            base_url: "https://web1.capetown.gov.za".into(),
            listings_url: "https://web1.capetown.gov.za/web1/citycareer/".into(),
            default_location: "Cape Town, Western Cape".into(),
            academic: false,
            selectors: SelectorProfile {
                job_list: ".job-row, tr".into(),
                title: ".job-title, td:first-child".into(),
                department: Some(".department, td:nth-child(2)".into()),
                location: None,
                closing_date: Some(".closing, td:last-child".into()),
                level: None,
                link: Some("a".into()),
            },
        },
        PortalConfig {
            id: "city-of-johannesburg".into(),
            name: "City of Johannesburg".into(),
            base_url: "https://www.joburg.org.za".into(),
            listings_url: "https://www.joburg.org.za/careers".into(),
            default_location: "Johannesburg, Gauteng".into(),
            academic: false,
            selectors: SelectorProfile {
                job_list: ".career-item, .job-post".into(),
                title: ".title, h3".into(),
                department: Some(".dept".into()),
                location: None,
                closing_date: None,
                level: None,
                link: Some("a".into()),
            },
        },
        PortalConfig {
            id: "wits".into(),
            name: "University of the Witwatersrand".into(),
            base_url: "https://www.wits.ac.za".into(),
            listings_url: "https://www.wits.ac.za/vacancies/".into(),
            default_location: "Johannesburg, Gauteng".into(),
            academic: true,
            selectors: SelectorProfile {
                job_list: ".vacancy-item, .job-listing".into(),
                title: ".job-title, h3".into(),
                department: Some(".faculty, .department".into()),
                location: None,
                closing_date: None,
                level: None,
                link: Some("a".into()),
            },
        },
        PortalConfig {
            id: "uct".into(),
            name: "University of Cape Town".into(),
            base_url: "https://www.uct.ac.za".into(),
            listings_url: "https://www.uct.ac.za/main/explore-uct/vacancies".into(),
            default_location: "Cape Town, Western Cape".into(),
            academic: true,
            selectors: SelectorProfile {
                job_list: ".job-item, li".into(),
                title: ".title, a".into(),
                department: Some(".dept".into()),
                location: None,
                closing_date: None,
                level: None,
                link: Some("a".into()),
            },
        },
    ]
}

/// Default employer career pages: the large SA retail, banking, telecoms,
/// and industrial employers.
pub fn default_employers() -> Vec<EmployerConfig> {
    let generic = SelectorProfile {
        job_list: ".job-item, .vacancy, .careers-listing li".into(),
        title: ".job-title, h3, a".into(),
        department: None,
        location: Some(".location, .job-location".into()),
        closing_date: None,
        level: None,
        link: Some("a".into()),
    };

    [
        ("shoprite", "Shoprite", "https://www.shopriteholdings.co.za/careers.html"),
        ("pick-n-pay", "Pick n Pay", "https://www.pnp.co.za/careers"),
        ("woolworths", "Woolworths", "https://www.woolworths.co.za/corporate/careers"),
        ("checkers", "Checkers", "https://www.checkers.co.za/careers"),
        ("standard-bank", "Standard Bank", "https://www.standardbank.com/sbg/careers"),
        ("fnb", "FNB", "https://www.fnb.co.za/careers/"),
        ("absa", "Absa", "https://www.absa.africa/absaafrica/careers/"),
        ("capitec", "Capitec", "https://www.capitecbank.co.za/about-us/careers/"),
        ("vodacom", "Vodacom", "https://www.vodacom.com/careers.php"),
        ("mtn", "MTN", "https://www.mtn.com/careers/"),
        ("telkom", "Telkom", "https://www.telkom.co.za/about_us/careers/"),
        ("sasol", "Sasol", "https://www.sasol.com/careers"),
    ]
    .into_iter()
    .map(|(id, name, url)| EmployerConfig {
        id: id.to_string(),
        name: name.to_string(),
        career_page_url: url.to_string(),
        selectors: generic.clone(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rss_catalog_has_all_priorities() {
        let sources = default_rss_sources();
        assert!(sources.iter().any(|s| s.priority == FeedPriority::High));
        assert!(sources.iter().any(|s| s.priority == FeedPriority::Medium));
        assert!(sources.iter().any(|s| s.priority == FeedPriority::Low));
        for source in &sources {
            assert!(!source.feeds.is_empty(), "{} has no feeds", source.id);
        }
    }

    #[test]
    fn default_portals_include_universities() {
        let portals = default_portals();
        assert!(portals.iter().any(|p| p.academic));
        assert!(portals.iter().any(|p| !p.academic));
    }

    #[test]
    fn default_employers_are_distinct() {
        let employers = default_employers();
        let mut ids: Vec<&str> = employers.iter().map(|e| e.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), employers.len());
    }
}
