//! Shared types, config, and error definitions for the stock monitor.

pub mod config;
pub mod error;
pub mod types;

pub use config::MonitorConfig;
pub use error::{format_error_chain, summarize_body, Error};
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
