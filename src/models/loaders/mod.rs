pub mod toml_loader;

pub use toml_loader::{load_scrape_config, parse_scrape_config};
