use crate::parser::{ParseError, search_for_products};
use crate::types::MatchSet;

use reqwest::blocking::Client;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
    url: String,
}

impl WebScraper {
    pub fn new(url: impl Into<String>) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Downloads the deals page. Any transport failure or non-2xx status is an error.
    pub fn fetch_page(&self) -> Result<String, ScraperError> {
        log::info!("Fetching deals page {}...", self.url);
        Ok(self
            .client
            .get(&self.url)
            .send()
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .text()
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }

    pub fn search_for_products(
        &self,
        products: &[impl AsRef<str>],
    ) -> Result<Option<MatchSet>, ScraperError> {
        let html = self.fetch_page()?;
        log::debug!("Fetched {} bytes", html.len());
        Ok(search_for_products(&html, products)?)
    }
}
