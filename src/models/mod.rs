pub mod job;
pub mod loaders;
pub mod review;
pub mod scrape_config;
pub mod sort;

pub use job::{Job, JobProgress, JobStats, JobStatus};
pub use loaders::load_scrape_config;
pub use review::Review;
pub use scrape_config::{ConfigOverrides, ScrapeConfig};
pub use sort::SortBy;
