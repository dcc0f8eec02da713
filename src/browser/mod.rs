pub mod headless;

pub use headless::{launch_browser, LaunchOptions, DESKTOP_USER_AGENT};
