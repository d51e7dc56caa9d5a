//! Stock monitor core.
//!
//! Extraction, change detection, history persistence, and the pass loop
//! that ties them to a page fetcher and a notifier.

pub mod detect;
pub mod extract;
pub mod history;
pub mod runner;

pub use detect::{ChangeDetector, Decision};
pub use extract::{compile_pattern, compile_products, extract, ProductSpec};
pub use history::HistoryStore;
pub use runner::Monitor;
