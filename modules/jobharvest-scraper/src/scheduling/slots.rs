//! The hourly slot table: which adapters run in which slot. The default
//! mirrors the free-sources-first policy: RSS carries the volume,
//! portals and career pages run in business hours, and the scarce paid
//! calls are placed where they buy the most (fresh mornings, executive
//! afternoons, and an end-of-day gap fill).

use std::collections::BTreeMap;

use crate::sources::catalog::FeedPriority;
use crate::sources::paid_search::SearchStrategy;

#[derive(Debug, Clone, PartialEq)]
pub enum SlotAction {
    /// Scrape the RSS feed groups with these priorities.
    Rss(Vec<FeedPriority>),
    Government,
    Company,
    PaidSearch(SearchStrategy),
}

impl SlotAction {
    /// Label used in summaries and error records.
    pub fn label(&self) -> String {
        match self {
            SlotAction::Rss(priorities) => {
                let tags: Vec<&str> = priorities
                    .iter()
                    .map(|p| match p {
                        FeedPriority::High => "high",
                        FeedPriority::Medium => "medium",
                        FeedPriority::Low => "low",
                    })
                    .collect();
                format!("rss_{}", tags.join("_"))
            }
            SlotAction::Government => "government".to_string(),
            SlotAction::Company => "companies".to_string(),
            SlotAction::PaidSearch(strategy) => format!("serpapi_{}", strategy.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlotPlan {
    table: BTreeMap<u8, Vec<SlotAction>>,
}

impl SlotPlan {
    /// The default seven-slot day.
    pub fn default_plan() -> Self {
        use FeedPriority::{High, Low, Medium};
        let mut table = BTreeMap::new();
        table.insert(0, vec![SlotAction::Rss(vec![High])]);
        table.insert(
            6,
            vec![
                SlotAction::Rss(vec![High, Medium]),
                SlotAction::PaidSearch(SearchStrategy::Fresh),
            ],
        );
        table.insert(9, vec![SlotAction::Government, SlotAction::Company]);
        table.insert(
            12,
            vec![
                SlotAction::Rss(vec![High, Medium, Low]),
                SlotAction::Government,
            ],
        );
        table.insert(
            15,
            vec![
                SlotAction::Rss(vec![High]),
                SlotAction::PaidSearch(SearchStrategy::Executive),
            ],
        );
        table.insert(
            18,
            vec![SlotAction::Rss(vec![High, Medium]), SlotAction::Company],
        );
        table.insert(
            21,
            vec![
                SlotAction::Rss(vec![Low]),
                SlotAction::PaidSearch(SearchStrategy::GapFill),
            ],
        );
        Self { table }
    }

    /// Override the default table entirely.
    pub fn from_table(table: BTreeMap<u8, Vec<SlotAction>>) -> Self {
        Self { table }
    }

    pub fn actions(&self, hour: u8) -> &[SlotAction] {
        self.table.get(&hour).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn hours(&self) -> Vec<u8> {
        self.table.keys().copied().collect()
    }
}

impl Default for SlotPlan {
    fn default() -> Self {
        Self::default_plan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_covers_seven_slots() {
        let plan = SlotPlan::default_plan();
        assert_eq!(plan.hours(), vec![0, 6, 9, 12, 15, 18, 21]);
    }

    #[test]
    fn paid_search_appears_in_three_slots_only() {
        let plan = SlotPlan::default_plan();
        let paid_slots: Vec<u8> = plan
            .hours()
            .into_iter()
            .filter(|hour| {
                plan.actions(*hour)
                    .iter()
                    .any(|a| matches!(a, SlotAction::PaidSearch(_)))
            })
            .collect();
        assert_eq!(paid_slots, vec![6, 15, 21]);
    }

    #[test]
    fn gap_fill_is_the_last_slot() {
        let plan = SlotPlan::default_plan();
        assert!(plan
            .actions(21)
            .contains(&SlotAction::PaidSearch(SearchStrategy::GapFill)));
    }

    #[test]
    fn unknown_hour_has_no_actions() {
        let plan = SlotPlan::default_plan();
        assert!(plan.actions(3).is_empty());
    }

    #[test]
    fn action_labels() {
        use FeedPriority::{High, Medium};
        assert_eq!(SlotAction::Rss(vec![High, Medium]).label(), "rss_high_medium");
        assert_eq!(
            SlotAction::PaidSearch(SearchStrategy::Fresh).label(),
            "serpapi_fresh"
        );
        assert_eq!(SlotAction::Government.label(), "government");
    }
}
