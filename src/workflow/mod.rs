pub mod scrape_flow;
pub mod scrape_runner;

pub use scrape_flow::{ChromiumScrapeFlow, FlowOptions};
pub use scrape_runner::{RunOutcome, ScrapeRunner};
