pub mod telegram;
pub mod webhook;

use std::error::Error as _;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use crate::services::MessageStyle;

pub use telegram::TelegramClient;
pub use webhook::WebhookNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// Transport failure that is worth retrying.
    #[error("transient transport error: {0}")]
    Transient(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status}: {description}")]
    Api { status: u16, description: String },
    #[error("rejected by service: {0}")]
    Rejected(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("client error: {0}")]
    Client(String),
}

impl NotifyError {
    pub fn is_transient(&self) -> bool {
        matches!(self, NotifyError::Transient(_))
    }
}

/// Matches connection reset/refused, timeouts, unexpected EOF and TLS handshake failures.
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    [
        "connection reset",
        "connection refused",
        "timed out",
        "timeout",
        "eof",
        "tls handshake",
        "handshake",
        "broken pipe",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

impl From<reqwest::Error> for NotifyError {
    /// The request URL is dropped: Bot API URLs embed the bot token.
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }

        if e.is_timeout() || e.is_connect() || is_transient_message(&message) {
            NotifyError::Transient(message)
        } else {
            NotifyError::Transport(message)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Not configured; nothing was sent.
    Skipped,
}

/// Inline URL button attached to the first chunk of a Telegram message.
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub text: String,
    pub url: String,
}

impl Button {
    /// `None` unless both text and url are set.
    pub fn from_parts(text: &str, url: &str) -> Option<Self> {
        if text.trim().is_empty() || url.trim().is_empty() {
            None
        } else {
            Some(Self {
                text: text.to_string(),
                url: url.to_string(),
            })
        }
    }
}

/// Request body for a chat API call.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Form(Vec<(&'static str, String)>),
    Json(Value),
}

/// POSTs `body` and returns the status and raw response text.
pub(crate) async fn post_body(
    client: &Client,
    url: &str,
    body: &MessageBody,
) -> Result<(StatusCode, String), NotifyError> {
    let request = match body {
        MessageBody::Form(fields) => client.post(url).form(fields),
        MessageBody::Json(value) => client.post(url).json(value),
    };
    let resp = request.send().await?;
    let status = resp.status();
    let text = resp.text().await?;
    Ok((status, text))
}

pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, NotifyError> {
    Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| NotifyError::Client(e.to_string()))
}

/// A chat endpoint alerts can be delivered to.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    fn name(&self) -> &'static str;
    fn style(&self) -> MessageStyle;
    fn max_message_len(&self) -> usize;
    async fn send_text(&self, text: &str, button: Option<&Button>) -> Result<SendOutcome, NotifyError>;
}
