//! Headless Chromium fetcher.
//!
//! Every fetch launches its own browser with a throwaway profile and tears it
//! down before returning, whatever the outcome. Nothing survives between
//! products or passes.

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig};
use common::config::FetchConfig;
use common::Error;
use futures::StreamExt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{non_empty, PageFetcher};

static PROFILE_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct BrowserFetcher {
    cfg: FetchConfig,
}

impl BrowserFetcher {
    pub fn new(cfg: FetchConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<String, Error> {
        info!("   (using browser mode to load page...)");
        let session = BrowserSession::launch(&self.cfg, url).await?;
        let result =
            with_deadline(url, render_deadline(&self.cfg), session.render(url, &self.cfg)).await;
        session.close().await;
        non_empty(url, result?)
    }
}

/// One launched browser plus the task draining its CDP event stream.
struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    profile_dir: PathBuf,
}

impl BrowserSession {
    async fn launch(cfg: &FetchConfig, url: &str) -> Result<Self, Error> {
        let profile_dir = fresh_profile_dir()
            .map_err(|e| Error::fetch(url, format!("failed to create browser profile: {}", e)))?;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(&profile_dir)
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", cfg.user_agent));

        if !cfg.headless {
            builder = builder.with_head();
        }
        if let Some(bin) = &cfg.chrome_bin {
            debug!("Using custom Chrome binary: {}", bin);
            builder = builder.chrome_executable(bin);
        }

        let config = match builder.build() {
            Ok(c) => c,
            Err(e) => {
                remove_profile_dir(&profile_dir);
                return Err(Error::fetch(
                    url,
                    format!("failed to build browser config: {}", e),
                ));
            }
        };

        let (browser, mut handler) = match Browser::launch(config).await {
            Ok(pair) => pair,
            Err(e) => {
                remove_profile_dir(&profile_dir);
                return Err(Error::fetch(url, format!("failed to launch browser: {}", e)));
            }
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error (ignoring): {}", e);
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
            profile_dir,
        })
    }

    async fn render(&self, url: &str, cfg: &FetchConfig) -> Result<String, Error> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::fetch(url, format!("failed to open tab: {}", e)))?;

        page.goto(url)
            .await
            .map_err(|e| Error::fetch(url, format!("navigation failed: {}", e)))?;

        // Challenge pages redirect to the real content once their script finishes.
        tokio::time::sleep(Duration::from_secs(cfg.settle_delay_secs)).await;

        page.content()
            .await
            .map_err(|e| Error::fetch(url, format!("failed to read page source: {}", e)))
    }

    /// Shut the browser down and remove its profile. Failures are logged only.
    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Error closing browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Error waiting for browser exit: {}", e);
        }
        if let Err(e) = self.handler_task.await {
            debug!("Browser handler task ended abnormally: {}", e);
        }
        remove_profile_dir(&self.profile_dir);
    }
}

/// Budget for the whole render: opening the tab, navigation, the settle
/// delay and reading the source.
fn render_deadline(cfg: &FetchConfig) -> Duration {
    Duration::from_secs(cfg.navigation_timeout_secs.saturating_add(cfg.settle_delay_secs))
}

async fn with_deadline<F>(url: &str, deadline: Duration, render: F) -> Result<String, Error>
where
    F: Future<Output = Result<String, Error>>,
{
    match tokio::time::timeout(deadline, render).await {
        Ok(result) => result,
        Err(_) => Err(Error::fetch(
            url,
            format!("page load timed out after {}s", deadline.as_secs()),
        )),
    }
}

fn fresh_profile_dir() -> std::io::Result<PathBuf> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = PROFILE_SEQ.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "stock-monitor-profile-{}-{}-{}",
        std::process::id(),
        nanos,
        seq
    ));
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

fn remove_profile_dir(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        debug!("Failed to clean up browser profile {}: {}", dir.display(), e);
    }
}
