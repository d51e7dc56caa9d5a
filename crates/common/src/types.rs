//! Domain types shared between the monitor loop and its collaborators.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Values pulled from one product page during one check.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Observation {
    pub stock: Option<u64>,
    pub price: Option<f64>,
}

impl Observation {
    pub fn new(stock: Option<u64>, price: Option<f64>) -> Self {
        Self { stock, price }
    }

    /// True when neither pattern produced a value.
    pub fn is_empty(&self) -> bool {
        self.stock.is_none() && self.price.is_none()
    }
}

/// Last successfully observed values for one product.
///
/// Both fields are always written (as `null` when unknown) so the state file
/// keeps a stable shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub stock: Option<u64>,
    #[serde(default)]
    pub price: Option<f64>,
}

impl HistoryEntry {
    /// Field-level merge: a value missing from `obs` keeps the stored one.
    pub fn merged_with(&self, obs: &Observation) -> HistoryEntry {
        HistoryEntry {
            stock: obs.stock.or(self.stock),
            price: obs.price.or(self.price),
        }
    }
}

impl From<Observation> for HistoryEntry {
    fn from(obs: Observation) -> Self {
        Self {
            stock: obs.stock,
            price: obs.price,
        }
    }
}

/// Whole persisted state, keyed by product name. Ordered so the file diff
/// stays readable between passes.
pub type History = BTreeMap<String, HistoryEntry>;

/// What happened to one product during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// A change was detected and the message was delivered (or logged in dry-run).
    Notified,
    /// A change was detected but delivery failed; history was still updated.
    NotifyFailed,
    /// Values matched the stored entry.
    Unchanged,
    /// The page loaded but neither pattern matched.
    NoData,
}

/// Per-pass counters, logged after history is persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub checked: usize,
    pub notified: usize,
    pub unchanged: usize,
    pub no_data: usize,
    pub failed: usize,
    pub persisted: bool,
}

impl PassSummary {
    pub fn record(&mut self, outcome: CheckOutcome) {
        self.checked += 1;
        match outcome {
            CheckOutcome::Notified => self.notified += 1,
            CheckOutcome::NotifyFailed => self.failed += 1,
            CheckOutcome::Unchanged => self.unchanged += 1,
            CheckOutcome::NoData => self.no_data += 1,
        }
    }

    pub fn record_failure(&mut self) {
        self.checked += 1;
        self.failed += 1;
    }
}
