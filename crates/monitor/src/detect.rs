//! Change detection and notification formatting.
//!
//! A product with no stored entry notifies as soon as anything was extracted.
//! Otherwise the stored entry is merged with the new observation field by
//! field (a value that failed to extract keeps the stored one) and the merge
//! is compared with what was stored. Any difference notifies.

use chrono::{DateTime, Local};
use common::{HistoryEntry, Observation};

/// Outcome of comparing one observation with stored history.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Formatted notification, present only when a change was detected.
    pub message: Option<String>,
    /// Entry to store, absent when the observation carried no values.
    pub updated: Option<HistoryEntry>,
}

impl Decision {
    pub fn should_notify(&self) -> bool {
        self.message.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ChangeDetector {
    currency_symbol: String,
    price_tolerance: f64,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new("¥", 0.0)
    }
}

impl ChangeDetector {
    pub fn new(currency_symbol: impl Into<String>, price_tolerance: f64) -> Self {
        Self {
            currency_symbol: currency_symbol.into(),
            price_tolerance: price_tolerance.max(0.0),
        }
    }

    pub fn decide(
        &self,
        name: &str,
        url: &str,
        obs: &Observation,
        previous: Option<&HistoryEntry>,
        now: DateTime<Local>,
    ) -> Decision {
        if obs.is_empty() {
            return Decision {
                message: None,
                updated: None,
            };
        }

        let (changed, updated) = match previous {
            None => (true, HistoryEntry::from(*obs)),
            Some(old) => {
                let mut merged = old.merged_with(obs);
                let price_changed = self.price_changed(old.price, merged.price);
                if !price_changed {
                    // Drift inside the tolerance is measured from the stored price.
                    merged.price = old.price;
                }
                (merged.stock != old.stock || price_changed, merged)
            }
        };

        let message = changed.then(|| {
            let (old_stock, old_price) = previous
                .map(|e| (e.stock, e.price))
                .unwrap_or((None, None));
            self.format_message(name, url, old_stock, obs.stock, old_price, obs.price, now)
        });

        Decision {
            message,
            updated: Some(updated),
        }
    }

    fn price_changed(&self, old: Option<f64>, new: Option<f64>) -> bool {
        match (old, new) {
            (Some(a), Some(b)) => self.prices_differ(a, b),
            (None, Some(_)) => true,
            (_, None) => false,
        }
    }

    fn prices_differ(&self, a: f64, b: f64) -> bool {
        if self.price_tolerance == 0.0 {
            a != b
        } else {
            (a - b).abs() > self.price_tolerance
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn format_message(
        &self,
        name: &str,
        url: &str,
        old_stock: Option<u64>,
        new_stock: Option<u64>,
        old_price: Option<f64>,
        new_price: Option<f64>,
        now: DateTime<Local>,
    ) -> String {
        let cur = &self.currency_symbol;
        let mut message = format!("📦 *{}* 监控提醒\n\n", escape_markdown(name));

        if let Some(new) = new_stock {
            match old_stock {
                Some(old) if old != new => {
                    let emoji = if new > old { "📈" } else { "📉" };
                    message.push_str(&format!("{} 库存变化: {} → *{}*\n", emoji, old, new));
                }
                _ => message.push_str(&format!("📦 当前库存: *{}*\n", new)),
            }
        }

        if let Some(new) = new_price {
            match old_price {
                Some(old) if self.prices_differ(old, new) => {
                    // Cheaper is the good news.
                    let emoji = if new < old { "💰" } else { "💸" };
                    message.push_str(&format!(
                        "{} 价格变化: {}{} → *{}{}*\n",
                        emoji,
                        cur,
                        format_price(old),
                        cur,
                        format_price(new)
                    ));
                }
                _ => message.push_str(&format!("💰 当前价格: *{}{}*\n", cur, format_price(new))),
            }
        }

        message.push_str(&format!(
            "\n🕐 检查时间: {}\n🔗 [点击查看商品]({})",
            now.format("%Y-%m-%d %H:%M:%S"),
            url
        ));
        message
    }
}

/// Backslash-escape the characters legacy Telegram Markdown treats as markup.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Whole prices keep one decimal ("20.0") so they read as prices, not counts.
pub fn format_price(price: f64) -> String {
    if price.fract() == 0.0 && price.abs() < 1e15 {
        format!("{:.1}", price)
    } else {
        format!("{}", price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const URL: &str = "https://example.com/product1";

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    fn entry(stock: Option<u64>, price: Option<f64>) -> HistoryEntry {
        HistoryEntry { stock, price }
    }

    fn decide(obs: Observation, previous: Option<HistoryEntry>) -> Decision {
        ChangeDetector::default().decide("商品1", URL, &obs, previous.as_ref(), now())
    }

    #[test]
    fn test_first_sighting_notifies_with_current_values() {
        let d = decide(Observation::new(Some(5), Some(19.99)), None);
        let msg = d.message.as_deref().unwrap();
        assert!(msg.starts_with("📦 *商品1* 监控提醒\n\n"));
        assert!(msg.contains("📦 当前库存: *5*"));
        assert!(msg.contains("💰 当前价格: *¥19.99*"));
        assert!(msg.contains("🕐 检查时间: 2024-05-01 12:30:00"));
        assert!(msg.ends_with("🔗 [点击查看商品](https://example.com/product1)"));
        assert_eq!(d.updated, Some(entry(Some(5), Some(19.99))));
    }

    #[test]
    fn test_stock_drop_uses_down_arrow() {
        let d = decide(
            Observation::new(Some(3), Some(19.99)),
            Some(entry(Some(5), Some(19.99))),
        );
        let msg = d.message.unwrap();
        assert!(msg.contains("📉 库存变化: 5 → *3*"));
        assert!(msg.contains("💰 当前价格: *¥19.99*"));
        assert_eq!(d.updated, Some(entry(Some(3), Some(19.99))));
    }

    #[test]
    fn test_stock_rise_uses_up_arrow() {
        let d = decide(Observation::new(Some(9), None), Some(entry(Some(2), None)));
        assert!(d.message.unwrap().contains("📈 库存变化: 2 → *9*"));
    }

    #[test]
    fn test_price_drop_is_cheaper() {
        let d = decide(
            Observation::new(Some(5), Some(15.0)),
            Some(entry(Some(5), Some(19.99))),
        );
        let msg = d.message.unwrap();
        assert!(msg.contains("💰 价格变化: ¥19.99 → *¥15.0*"));
        assert!(msg.contains("📦 当前库存: *5*"));
    }

    #[test]
    fn test_price_rise_is_more_expensive() {
        let d = decide(Observation::new(None, Some(25.5)), Some(entry(None, Some(20.0))));
        assert!(d.message.unwrap().contains("💸 价格变化: ¥20.0 → *¥25.5*"));
    }

    #[test]
    fn test_unchanged_values_do_not_notify() {
        let stored = entry(Some(5), Some(19.99));
        let d = decide(Observation::new(Some(5), Some(19.99)), Some(stored));
        assert!(!d.should_notify());
        assert_eq!(d.updated, Some(stored));
    }

    #[test]
    fn test_missing_price_keeps_stored_price() {
        let stored = entry(Some(5), Some(19.99));
        let d = decide(Observation::new(Some(5), None), Some(stored));
        assert!(!d.should_notify());
        assert_eq!(d.updated, Some(stored));
    }

    #[test]
    fn test_newly_present_field_counts_as_change() {
        let d = decide(Observation::new(Some(5), Some(10.0)), Some(entry(Some(5), None)));
        let msg = d.message.unwrap();
        assert!(msg.contains("💰 当前价格: *¥10.0*"));
        assert_eq!(d.updated, Some(entry(Some(5), Some(10.0))));
    }

    #[test]
    fn test_empty_observation_is_a_no_op() {
        let d = decide(Observation::default(), None);
        assert_eq!(
            d,
            Decision {
                message: None,
                updated: None
            }
        );

        let d = decide(Observation::default(), Some(entry(Some(1), Some(1.0))));
        assert!(!d.should_notify());
        assert!(d.updated.is_none());
    }

    #[test]
    fn test_exact_comparison_by_default() {
        let d = decide(
            Observation::new(None, Some(19.990000001)),
            Some(entry(None, Some(19.99))),
        );
        assert!(d.should_notify());
    }

    #[test]
    fn test_tolerance_absorbs_tiny_differences() {
        let detector = ChangeDetector::new("¥", 0.001);
        let stored = entry(None, Some(19.99));
        let d = detector.decide(
            "商品1",
            URL,
            &Observation::new(None, Some(19.990000001)),
            Some(&stored),
            now(),
        );
        assert!(!d.should_notify());
    }

    #[test]
    fn test_tolerance_does_not_let_price_drift() {
        let detector = ChangeDetector::new("¥", 0.5);
        let mut stored: Option<HistoryEntry> = None;
        let mut notified = Vec::new();
        for price in [10.0, 10.4, 10.8, 11.2, 11.6, 12.0] {
            let d = detector.decide(
                "商品1",
                URL,
                &Observation::new(None, Some(price)),
                stored.as_ref(),
                now(),
            );
            if d.should_notify() {
                notified.push(price);
            }
            stored = d.updated;
        }
        // First sighting, then the first step more than 0.5 away from 10.0.
        assert_eq!(notified, vec![10.0, 10.8, 11.6]);
        assert_eq!(stored, Some(entry(None, Some(11.6))));
    }

    #[test]
    fn test_within_tolerance_keeps_stored_price_on_stock_change() {
        let detector = ChangeDetector::new("¥", 0.5);
        let stored = entry(Some(5), Some(10.0));
        let d = detector.decide(
            "商品1",
            URL,
            &Observation::new(Some(4), Some(10.2)),
            Some(&stored),
            now(),
        );
        assert!(d.should_notify());
        assert_eq!(d.updated, Some(entry(Some(4), Some(10.0))));
    }

    #[test]
    fn test_product_name_is_markdown_escaped() {
        let d = ChangeDetector::default().decide(
            "my_item*[v2]",
            URL,
            &Observation::new(Some(1), None),
            None,
            now(),
        );
        assert!(d.message.unwrap().starts_with("📦 *my\\_item\\*\\[v2]* 监控提醒"));
    }

    #[test]
    fn test_escape_markdown_leaves_plain_text_alone() {
        assert_eq!(escape_markdown("商品1 (红色)"), "商品1 (红色)");
        assert_eq!(escape_markdown("a`b"), "a\\`b");
    }

    #[test]
    fn test_custom_currency_symbol() {
        let detector = ChangeDetector::new("$", 0.0);
        let d = detector.decide("Widget", URL, &Observation::new(None, Some(3.5)), None, now());
        assert!(d.message.unwrap().contains("💰 当前价格: *$3.5*"));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(19.99), "19.99");
        assert_eq!(format_price(20.0), "20.0");
        assert_eq!(format_price(0.5), "0.5");
    }
}
