//! Page retrieval for the stock monitor.
//!
//! Two implementations behind one trait: a headless Chromium session that
//! executes page scripts and waits out anti-bot challenges, and a plain HTTP
//! GET for sites that serve stock and price in the initial markup.

pub mod browser;
pub mod http;

use async_trait::async_trait;
use common::config::{FetchConfig, FetchMode};
use common::Error;

pub use browser::BrowserFetcher;
pub use http::HttpFetcher;

/// Retrieves the rendered markup for a product URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Return the full page markup, or `Error::Fetch` when nothing usable came back.
    async fn fetch(&self, url: &str) -> Result<String, Error>;
}

/// Build the fetcher selected by `fetch.mode`.
pub fn from_config(cfg: &FetchConfig) -> Result<Box<dyn PageFetcher>, Error> {
    match cfg.mode {
        FetchMode::Browser => Ok(Box::new(BrowserFetcher::new(cfg.clone()))),
        FetchMode::Http => Ok(Box::new(HttpFetcher::new(cfg)?)),
    }
}

/// An empty or whitespace-only body counts as a failed fetch.
pub(crate) fn non_empty(url: &str, html: String) -> Result<String, Error> {
    if html.trim().is_empty() {
        return Err(Error::fetch(url, "page returned no content"));
    }
    Ok(html)
}
