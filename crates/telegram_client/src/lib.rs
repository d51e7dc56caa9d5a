//! Telegram Bot API client.
//!
//! Delivers change notifications through `sendMessage` with Markdown
//! formatting. The monitor only depends on the `Notifier` trait, so a
//! log-only implementation stands in for dry runs.

use async_trait::async_trait;
use common::config::TelegramConfig;
use common::{format_error_chain, summarize_body, Error};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Proof of delivery returned by a `Notifier`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivered {
    /// Message id assigned by the channel, when it reports one.
    pub message_id: Option<i64>,
}

/// Sends a formatted message to the operator's channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<Delivered, Error>;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    result: Option<SentMessage>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(cfg: &TelegramConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent("stock-monitor/0.1")
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build Telegram HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: send_message_url(&cfg.api_base_url, &cfg.bot_token),
            chat_id: cfg.chat_id.clone(),
        })
    }
}

fn send_message_url(base_url: &str, bot_token: &str) -> String {
    format!(
        "{}/bot{}/sendMessage",
        base_url.trim().trim_end_matches('/'),
        bot_token.trim()
    )
}

/// Interpret a `sendMessage` reply. Any non-2xx status or `ok: false` is a failure.
fn parse_send_response(status: u16, body: &str) -> Result<Delivered, Error> {
    if !(200..300).contains(&status) {
        return Err(Error::Notify(format!(
            "Telegram returned {}: {}",
            status,
            summarize_body(body)
        )));
    }

    match serde_json::from_str::<SendMessageResponse>(body) {
        Ok(resp) if !resp.ok => Err(Error::Notify(format!(
            "Telegram rejected message: {}",
            resp.description.unwrap_or_else(|| summarize_body(body))
        ))),
        Ok(resp) => Ok(Delivered {
            message_id: resp.result.map(|m| m.message_id),
        }),
        // A 2xx with an unexpected body still counts as delivered.
        Err(_) => Ok(Delivered::default()),
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn notify(&self, text: &str) -> Result<Delivered, Error> {
        let req = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .form(&req)
            .send()
            .await
            .map_err(|e| Error::Notify(format_error_chain(&e)))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let delivered = parse_send_response(status, &body)?;

        info!("✅ Message sent");
        debug!("Telegram message id: {:?}", delivered.message_id);
        Ok(delivered)
    }
}

/// Logs messages instead of sending them. Used by `--dry-run`.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) -> Result<Delivered, Error> {
        info!("[dry-run] notification not sent:\n{}", text);
        Ok(Delivered::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_message_url_trims_slashes() {
        assert_eq!(
            send_message_url("https://api.telegram.org/", " 123:abc "),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_ok_response_yields_message_id() {
        let body = r#"{"ok":true,"result":{"message_id":42,"chat":{"id":1}}}"#;
        let delivered = parse_send_response(200, body).unwrap();
        assert_eq!(delivered.message_id, Some(42));
    }

    #[test]
    fn test_non_2xx_is_notify_error() {
        let body = r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#;
        let err = parse_send_response(401, body).unwrap_err();
        assert_eq!(err.kind(), "notify");
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_ok_false_with_2xx_is_rejected() {
        let body = r#"{"ok":false,"description":"Bad Request: can't parse entities"}"#;
        let err = parse_send_response(200, body).unwrap_err();
        assert!(err.to_string().contains("can't parse entities"));
    }

    #[test]
    fn test_unparseable_2xx_counts_as_delivered() {
        assert_eq!(
            parse_send_response(200, "OK").unwrap(),
            Delivered { message_id: None }
        );
    }

    #[test]
    fn test_request_form_fields() {
        let req = SendMessageRequest {
            chat_id: "1001",
            text: "hi",
            parse_mode: "Markdown",
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["chat_id"], "1001");
        assert_eq!(value["parse_mode"], "Markdown");
    }

    #[tokio::test]
    async fn test_log_notifier_always_delivers() {
        let delivered = LogNotifier.notify("📦 *商品1* 监控提醒").await.unwrap();
        assert_eq!(delivered.message_id, None);
    }
}
