//! Unified error type for the stock monitor.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Extraction failed ({field}): {message}")]
    Extract {
        field: &'static str,
        message: String,
    },

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("History persistence failed: {0}")]
    Persist(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

}

impl Error {
    pub fn fetch(url: &str, message: impl Into<String>) -> Self {
        Error::Fetch {
            url: url.to_string(),
            message: message.into(),
        }
    }

    /// Short label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Fetch { .. } => "fetch",
            Error::Extract { .. } => "extract",
            Error::Notify(_) => "notify",
            Error::Persist(_) => "persist",
            Error::Config(_) => "config",
            Error::Json(_) => "json",
        }
    }
}

/// Render an error with its chained causes so network failures (DNS/TLS/socket)
/// are visible in a single log line.
pub fn format_error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

/// Collapse a response body onto one line and cap its length.
pub fn summarize_body(raw: &str) -> String {
    const MAX_CHARS: usize = 500;
    let compact = raw.replace(['\n', '\r'], " ");
    if compact.chars().count() > MAX_CHARS {
        let cut: String = compact.chars().take(MAX_CHARS).collect();
        format!("{}…", cut)
    } else {
        compact
    }
}
