//! The monitor loop.
//!
//! Idle → Checking when the interval elapses, Checking → Idle once every
//! product has been visited and history is written back. Products are
//! checked strictly one after another; a failure on one is logged and the
//! pass moves on.

use std::time::Duration;

use chrono::Local;
use common::{CheckOutcome, Error, History, MonitorConfig, PassSummary};
use page_fetcher::PageFetcher;
use telegram_client::Notifier;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::detect::ChangeDetector;
use crate::extract::{compile_products, ProductSpec};
use crate::history::HistoryStore;

pub struct Monitor {
    products: Vec<ProductSpec>,
    detector: ChangeDetector,
    store: HistoryStore,
    history: History,
    fetcher: Box<dyn PageFetcher>,
    notifier: Box<dyn Notifier>,
    interval: Duration,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Monitor {
    /// Compile the product list and load persisted history.
    pub fn new(
        cfg: &MonitorConfig,
        fetcher: Box<dyn PageFetcher>,
        notifier: Box<dyn Notifier>,
    ) -> Result<Self, Error> {
        let products = compile_products(&cfg.products)?;
        let store = HistoryStore::new(cfg.history_path.clone());
        let history = store.load();

        Ok(Self {
            products,
            detector: ChangeDetector::new(cfg.currency_symbol.clone(), cfg.price_tolerance),
            store,
            history,
            fetcher,
            notifier,
            interval: Duration::from_secs(cfg.interval),
            shutdown: None,
        })
    }

    /// Stop between products or during the sleep once `rx` reads `true`.
    pub fn with_shutdown(mut self, rx: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(rx);
        self
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Run passes until shutdown is requested.
    pub async fn run(mut self) {
        loop {
            self.run_pass().await;

            if self.stop_requested() {
                info!("Stop requested; leaving monitor loop");
                return;
            }

            info!(
                "✅ Pass complete, waiting {} seconds...",
                self.interval.as_secs()
            );
            if self.idle().await {
                info!("Stop requested while idle; leaving monitor loop");
                return;
            }
        }
    }

    /// Check every product once, then persist history.
    pub async fn run_pass(&mut self) -> PassSummary {
        info!(
            "🔄 Starting check - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        let mut summary = PassSummary::default();
        let Self {
            products,
            detector,
            history,
            fetcher,
            notifier,
            shutdown,
            ..
        } = &mut *self;

        for product in products.iter() {
            if is_stopped(shutdown) {
                warn!("Interrupted; skipping remaining products this pass");
                break;
            }

            match check_product(
                &**fetcher,
                &**notifier,
                detector,
                product,
                history,
            )
            .await
            {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    error!("❌ Failed to monitor {} [{}]: {}", product.name, e.kind(), e);
                    summary.record_failure();
                }
            }
        }

        match self.store.save(&self.history) {
            Ok(()) => summary.persisted = true,
            Err(e) => error!("❌ {}", e),
        }

        info!(
            "Pass summary: checked={} notified={} unchanged={} no_data={} failed={} persisted={}",
            summary.checked,
            summary.notified,
            summary.unchanged,
            summary.no_data,
            summary.failed,
            summary.persisted
        );
        summary
    }

    /// True once the shutdown channel has signalled.
    pub fn stop_requested(&self) -> bool {
        is_stopped(&self.shutdown)
    }

    /// Sleep for one interval. Returns true when shutdown cut the sleep short.
    async fn idle(&mut self) -> bool {
        let sleep = tokio::time::sleep(self.interval);
        let Some(rx) = self.shutdown.as_mut() else {
            sleep.await;
            return false;
        };

        tokio::select! {
            _ = sleep => false,
            _ = wait_for_stop(rx) => true,
        }
    }
}

fn is_stopped(shutdown: &Option<watch::Receiver<bool>>) -> bool {
    shutdown.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
}

async fn wait_for_stop(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone: no stop signal can arrive any more.
            std::future::pending::<()>().await;
        }
    }
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "None".to_string(), |v| v.to_string())
}

async fn check_product(
    fetcher: &dyn PageFetcher,
    notifier: &dyn Notifier,
    detector: &ChangeDetector,
    product: &ProductSpec,
    history: &mut History,
) -> Result<CheckOutcome, Error> {
    info!("🔍 Checking product: {}", product.name);

    let html = fetcher.fetch(&product.url).await?;
    let obs = product.extract(&html)?;

    let previous = history.get(&product.name);
    info!(
        "    stock: {} → {}",
        fmt_opt(previous.and_then(|e| e.stock)),
        fmt_opt(obs.stock)
    );
    info!(
        "    price: {} → {}",
        fmt_opt(previous.and_then(|e| e.price)),
        fmt_opt(obs.price)
    );

    let decision = detector.decide(&product.name, &product.url, &obs, previous, Local::now());

    let outcome = match decision.message.as_deref() {
        Some(message) => {
            info!("   ✨ Change detected, sending notification...");
            match notifier.notify(message).await {
                Ok(_) => CheckOutcome::Notified,
                Err(e) => {
                    error!("❌ Notification for {} failed: {}", product.name, e);
                    CheckOutcome::NotifyFailed
                }
            }
        }
        None if obs.is_empty() => {
            warn!("    no stock or price found on page for {}", product.name);
            CheckOutcome::NoData
        }
        None => CheckOutcome::Unchanged,
    };

    if let Some(entry) = decision.updated {
        history.insert(product.name.clone(), entry);
    }

    Ok(outcome)
}
