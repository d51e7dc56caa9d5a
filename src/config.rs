//! Configuration loader: merges env vars, .env file, and config.toml.

use common::config::{FetchMode, MonitorConfig, CREDENTIAL_PLACEHOLDER};
use common::Error;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(Error::Config(format!("{env_name} must be an integer > 0"))),
    }
}

fn parse_non_negative_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer >= 0")))
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

fn is_placeholder(value: &str) -> bool {
    value.contains(CREDENTIAL_PLACEHOLDER)
}

/// Check everything at once so the operator sees every problem in one run.
pub fn validate_config(config: &MonitorConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    let token = config.telegram.bot_token.trim();
    if token.is_empty() {
        issues.push("TELEGRAM_BOT_TOKEN is required (set in .env, environment, or [telegram])".into());
    } else if is_placeholder(token) {
        issues.push("telegram.bot_token still contains the sample placeholder".into());
    }
    let chat_id = config.telegram.chat_id.trim();
    if chat_id.is_empty() {
        issues.push("TELEGRAM_CHAT_ID is required (set in .env, environment, or [telegram])".into());
    } else if is_placeholder(chat_id) {
        issues.push("telegram.chat_id still contains the sample placeholder".into());
    }
    if config.telegram.timeout_secs == 0 {
        issues.push("telegram.timeout_secs must be > 0".into());
    }

    if config.interval == 0 {
        issues.push("interval must be > 0".into());
    }
    if config.history_path.as_os_str().is_empty() {
        issues.push("history_path must not be empty".into());
    }
    if !config.price_tolerance.is_finite() || config.price_tolerance < 0.0 {
        issues.push("price_tolerance must be a number >= 0".into());
    }
    if config.fetch.navigation_timeout_secs == 0 {
        issues.push("fetch.navigation_timeout_secs must be > 0".into());
    }

    if config.products.is_empty() {
        issues.push("products must contain at least one product".into());
    }
    let mut seen = HashSet::new();
    for (i, p) in config.products.iter().enumerate() {
        let label = if p.name.trim().is_empty() {
            format!("products[{i}]")
        } else {
            format!("products[{}]", p.name)
        };
        if p.name.trim().is_empty() {
            issues.push(format!("{label}.name must not be empty"));
        } else if !seen.insert(p.name.as_str()) {
            issues.push(format!("{label}: duplicate product name"));
        }
        if !(p.url.starts_with("http://") || p.url.starts_with("https://")) {
            issues.push(format!("{label}.url must start with http:// or https://"));
        }

        let patterns = [
            ("stock_pattern", p.stock_pattern.as_deref()),
            ("price_pattern", p.price_pattern.as_deref()),
        ];
        let mut any_pattern = false;
        for (field, raw) in patterns {
            let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
                continue;
            };
            any_pattern = true;
            if let Err(e) = monitor::compile_pattern(raw) {
                issues.push(format!("{label}.{field} is not a valid regex: {e}"));
            }
        }
        if !any_pattern {
            issues.push(format!(
                "{label} needs at least one of stock_pattern / price_pattern"
            ));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load configuration from `.env`, the config file, and the environment.
///
/// A missing config file is only an error when it was named explicitly.
pub fn load_config(path: Option<&Path>) -> Result<MonitorConfig, Error> {
    // 1. Load .env file from the working directory or its parents.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = MonitorConfig::default();

    // 3. Layer the config file on top.
    let (config_path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from("config.toml"), false),
    };
    if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
    } else if explicit {
        return Err(Error::Config(format!(
            "Config file not found: {}",
            config_path.display()
        )));
    }

    // 4. Environment variables win.
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    // 5. Validate.
    validate_config(&config)?;

    Ok(config)
}

fn apply_env_overrides(
    config: &mut MonitorConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(token) = env("TELEGRAM_BOT_TOKEN") {
        config.telegram.bot_token = token;
    }
    if let Some(chat_id) = env("TELEGRAM_CHAT_ID") {
        config.telegram.chat_id = chat_id;
    }
    if let Some(base) = env("TELEGRAM_API_BASE_URL") {
        let trimmed = base.trim();
        if !trimmed.is_empty() {
            config.telegram.api_base_url = trimmed.to_string();
        }
    }
    if let Some(raw) = env("MONITOR_INTERVAL_SECS") {
        config.interval = parse_positive_u64(&raw, "MONITOR_INTERVAL_SECS")?;
    }
    if let Some(raw) = env("MONITOR_HISTORY_PATH") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            config.history_path = PathBuf::from(trimmed);
        }
    }
    if let Some(mode) = env("MONITOR_FETCH_MODE") {
        config.fetch.mode = match mode.trim().to_ascii_lowercase().as_str() {
            "browser" => FetchMode::Browser,
            "http" => FetchMode::Http,
            _ => {
                return Err(Error::Config(
                    "MONITOR_FETCH_MODE must be one of: browser, http".into(),
                ));
            }
        };
    }
    if let Some(raw) = env("MONITOR_SETTLE_DELAY_SECS") {
        config.fetch.settle_delay_secs = parse_non_negative_u64(&raw, "MONITOR_SETTLE_DELAY_SECS")?;
    }
    if let Some(raw) = env("MONITOR_HEADLESS") {
        config.fetch.headless = parse_bool(&raw);
    }
    if let Some(bin) = env("CHROME_BIN") {
        let trimmed = bin.trim();
        if !trimmed.is_empty() {
            config.fetch.chrome_bin = Some(trimmed.to_string());
        }
    }
    Ok(())
}
