pub mod catalog;
pub mod company;
pub mod fetch;
pub mod government;
pub mod paid_search;
pub mod registry;
pub mod rss;

pub use company::CompanyAdapter;
pub use government::GovernmentAdapter;
pub use paid_search::{PaidSearchAdapter, SearchStrategy};
pub use registry::{disabled_entry, is_disabled, DisabledSource, DISABLED_SOURCES};
pub use rss::RssAdapter;
