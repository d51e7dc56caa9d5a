//! Stock monitor: watches product pages for stock and price changes.
//!
//! Single-binary Tokio application that, once per interval:
//! 1. Loads each configured product page (headless browser or plain HTTP)
//! 2. Extracts stock count and price with per-product patterns
//! 3. Compares them with the persisted history
//! 4. Sends a Telegram message when something changed
//! 5. Writes the history file back

mod config;

use std::path::PathBuf;

use clap::Parser;
use monitor::Monitor;
use page_fetcher::PageFetcher;
use telegram_client::{LogNotifier, Notifier, TelegramClient};
use tokio::sync::watch;
use tracing::{error, info};

/// Product stock & price monitor
#[derive(Parser)]
#[command(name = "stock-monitor", about = "Product stock and price monitor")]
struct Cli {
    /// Path to the TOML config file (default: ./config.toml if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single pass and exit.
    #[arg(long)]
    once: bool,

    /// Log notifications instead of sending them.
    #[arg(long)]
    dry_run: bool,

    /// Send a test message to the configured chat, then exit.
    #[arg(long)]
    check_notify: bool,
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stock_monitor=info,monitor=info,page_fetcher=info,telegram_client=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("🚀 Stock monitor starting up...");

    // Load configuration.
    let cfg = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("❌ Fatal: {}", e);
            std::process::exit(1);
        }
    };

    info!("📊 Products: {}", cfg.products.len());
    info!("⏰ Interval: {}s", cfg.interval);
    info!(
        "Fetch: mode={:?}, settle={}s, timeout={}s",
        cfg.fetch.mode, cfg.fetch.settle_delay_secs, cfg.fetch.navigation_timeout_secs
    );
    info!("History file: {}", cfg.history_path.display());
    info!("{}", "-".repeat(50));

    let telegram = match TelegramClient::new(&cfg.telegram) {
        Ok(t) => t,
        Err(e) => {
            error!("❌ Fatal: {}", e);
            std::process::exit(1);
        }
    };

    // ── Check-notify mode ────────────────────────────────────────────
    if cli.check_notify {
        info!("Sending test message...");
        match telegram.notify("✅ stock-monitor test message").await {
            Ok(d) => info!("✅ Telegram delivery OK (message_id={:?})", d.message_id),
            Err(e) => {
                error!("❌ Telegram delivery failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let notifier: Box<dyn Notifier> = if cli.dry_run {
        info!("Dry-run: notifications will be logged, not sent");
        Box::new(LogNotifier)
    } else {
        Box::new(telegram)
    };

    let fetcher: Box<dyn PageFetcher> = match page_fetcher::from_config(&cfg.fetch) {
        Ok(f) => f,
        Err(e) => {
            error!("❌ Fatal: {}", e);
            std::process::exit(1);
        }
    };

    // Ctrl+C stops between products in both modes; the partial pass is saved.
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received; finishing current product...");
                let _ = stop_tx.send(true);
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let mut monitor = match Monitor::new(&cfg, fetcher, notifier) {
        Ok(m) => m.with_shutdown(stop_rx),
        Err(e) => {
            error!("❌ Fatal: {}", e);
            std::process::exit(1);
        }
    };

    // ── Single pass ──────────────────────────────────────────────────
    if cli.once {
        let summary = monitor.run_pass().await;
        info!(
            "Single pass finished: {} checked, {} notified, {} failed",
            summary.checked, summary.notified, summary.failed
        );
        if monitor.stop_requested() {
            info!("👋 Monitor stopped by user.");
        }
        return;
    }

    // ── Loop until Ctrl+C ────────────────────────────────────────────
    info!("🚀 Monitor is running. Press Ctrl+C to stop.");
    monitor.run().await;

    info!("👋 Monitor stopped by user.");
}
