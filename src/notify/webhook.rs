use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use crate::config::{WebhookConfig, WebhookKind};
use crate::services::{MessageStyle, RetryPolicy};
use super::{build_client, post_body, Button, ChatNotifier, MessageBody, NotifyError, SendOutcome};

const SERVERCHAN_BASE: &str = "https://sctapi.ftqq.com";
const WXPUSHER_URL: &str = "https://wxpusher.zjiecode.com/api/send/message";
const WECOM_BASE: &str = "https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=";

/// Group-chat push services reached over a single HTTP webhook.
pub struct WebhookNotifier {
    client: Client,
    kind: WebhookKind,
    api_key: String,
    uid: String,
    webhook_url: String,
    title: String,
    retry: RetryPolicy,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Result<Self, NotifyError> {
        let webhook_url = if !config.webhook_url.trim().is_empty() {
            config.webhook_url.trim().to_string()
        } else if !config.webhook_key.trim().is_empty() {
            format!("{}{}", WECOM_BASE, config.webhook_key.trim())
        } else {
            String::new()
        };

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            kind: config.kind,
            api_key: config.api_key.trim().to_string(),
            uid: config.uid.trim().to_string(),
            webhook_url,
            title: config.title.clone(),
            retry: RetryPolicy::linear(3, Duration::from_millis(config.retry_unit_ms)),
        })
    }

    /// Target URL, or `None` when a required credential is missing.
    pub fn endpoint(&self) -> Option<String> {
        match self.kind {
            WebhookKind::ServerChan if !self.api_key.is_empty() => {
                Some(format!("{}/{}.send", SERVERCHAN_BASE, self.api_key))
            }
            WebhookKind::WxPusher if !self.api_key.is_empty() && !self.uid.is_empty() => {
                Some(WXPUSHER_URL.to_string())
            }
            WebhookKind::WeCom if !self.webhook_url.is_empty() => Some(self.webhook_url.clone()),
            _ => None,
        }
    }

    pub fn build_payload(&self, text: &str) -> MessageBody {
        match self.kind {
            WebhookKind::ServerChan => MessageBody::Form(vec![
                ("title", self.title.clone()),
                ("desp", text.to_string()),
            ]),
            WebhookKind::WxPusher => MessageBody::Json(json!({
                "appToken": self.api_key,
                "content": text,
                "summary": self.title,
                "contentType": 1,
                "uids": [self.uid],
            })),
            WebhookKind::WeCom => MessageBody::Json(json!({
                "msgtype": "text",
                "text": { "content": text },
            })),
        }
    }
}

/// Each service reports success in its own field.
pub fn check_response(kind: WebhookKind, body: &Value) -> Result<(), NotifyError> {
    let (ok, message) = match kind {
        WebhookKind::ServerChan => (
            body.get("code").and_then(Value::as_i64) == Some(0),
            body.get("message").and_then(Value::as_str),
        ),
        WebhookKind::WxPusher => (
            body.get("success").and_then(Value::as_bool) == Some(true),
            body.get("msg").and_then(Value::as_str),
        ),
        WebhookKind::WeCom => (
            body.get("errcode").and_then(Value::as_i64) == Some(0),
            body.get("errmsg").and_then(Value::as_str),
        ),
    };

    if ok {
        Ok(())
    } else {
        Err(NotifyError::Rejected(message.unwrap_or("unknown error").to_string()))
    }
}

#[async_trait]
impl ChatNotifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        match self.kind {
            WebhookKind::ServerChan => "serverchan",
            WebhookKind::WxPusher => "wxpusher",
            WebhookKind::WeCom => "wecom",
        }
    }

    fn style(&self) -> MessageStyle {
        MessageStyle::Plain
    }

    fn max_message_len(&self) -> usize {
        match self.kind {
            WebhookKind::WeCom => 2048,
            _ => 4096,
        }
    }

    async fn send_text(&self, text: &str, _button: Option<&Button>) -> Result<SendOutcome, NotifyError> {
        let Some(url) = self.endpoint() else {
            tracing::warn!("⚠️ {} webhook not configured, message skipped", self.name());
            return Ok(SendOutcome::Skipped);
        };

        let body = self.build_payload(text);
        let label = format!("{} send", self.name());
        self.retry
            .run(
                &label,
                || async {
                    let (status, raw) = post_body(&self.client, &url, &body).await?;
                    if !status.is_success() {
                        return Err(NotifyError::Api {
                            status: status.as_u16(),
                            description: raw.chars().take(200).collect(),
                        });
                    }
                    let parsed: Value = serde_json::from_str(&raw)
                        .map_err(|e| NotifyError::Rejected(format!("unreadable response: {}", e)))?;
                    check_response(self.kind, &parsed)
                },
                NotifyError::is_transient,
            )
            .await?;

        tracing::debug!("📨 {} message sent ({} chars)", self.name(), text.chars().count());
        Ok(SendOutcome::Sent)
    }
}
