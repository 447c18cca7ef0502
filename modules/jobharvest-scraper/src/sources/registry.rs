//! Disabled-source registry. Sources listed here must never be wired or
//! scraped, even when configuration names them: they either block
//! automated access or carry legal risk. Each entry points at the
//! sanctioned alternative.

use jobharvest_common::HarvestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisabledSource {
    pub id: &'static str,
    pub reason: &'static str,
    pub alternative: &'static str,
}

pub const DISABLED_SOURCES: &[DisabledSource] = &[
    DisabledSource {
        id: "linkedin",
        reason: "no API access, prohibits automated collection",
        alternative: "paid search surfaces LinkedIn-listed roles",
    },
    DisabledSource {
        id: "indeed-scraper",
        reason: "direct page scraping pending publisher-program approval",
        alternative: "Indeed RSS feeds plus paid search",
    },
    DisabledSource {
        id: "glassdoor",
        reason: "no API access, blocks scrapers",
        alternative: "paid search surfaces Glassdoor-listed roles",
    },
    DisabledSource {
        id: "jobspy",
        reason: "legal risk when run server-side",
        alternative: "users run it client-side and upload results",
    },
];

pub fn is_disabled(id: &str) -> bool {
    disabled_entry(id).is_some()
}

pub fn disabled_entry(id: &str) -> Option<&'static DisabledSource> {
    DISABLED_SOURCES.iter().find(|entry| entry.id == id)
}

/// Guard used at wiring time: refuse to construct any adapter whose id is
/// registered as disabled.
pub fn ensure_enabled(id: &str) -> Result<(), HarvestError> {
    if is_disabled(id) {
        return Err(HarvestError::SourceDisabled(id.to_string()));
    }
    Ok(())
}
