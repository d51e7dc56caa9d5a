//! Plain HTTP fetcher.

use async_trait::async_trait;
use common::config::FetchConfig;
use common::{format_error_chain, summarize_body, Error};
use std::time::Duration;
use tracing::debug;

use crate::{non_empty, PageFetcher};

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(cfg: &FetchConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(cfg.navigation_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, Error> {
        debug!("GET {}", url);

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::fetch(url, format_error_chain(&e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::fetch(
                url,
                format!("HTTP {}: {}", status.as_u16(), summarize_body(&body)),
            ));
        }

        let html = resp
            .text()
            .await
            .map_err(|e| Error::fetch(url, format_error_chain(&e)))?;

        non_empty(url, html)
    }
}
