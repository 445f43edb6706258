pub mod auth;
pub mod config;
pub mod notifier;
mod parser;
pub mod scraper;
pub mod types;
pub mod utils;

pub use config::Config;
pub use notifier::{Delivery, Notifier};
pub use parser::{FRESHNESS_PATH, ParseError, Step, is_fresh, search_for_products};
pub use scraper::{ScraperError, WebScraper};
pub use types::MatchSet;

pub(crate) const SITE_NAME: &str = "SmartBuy";
