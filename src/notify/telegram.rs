use std::path::Path;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use crate::config::TelegramConfig;
use crate::services::{MessageStyle, RetryPolicy};
use super::{build_client, post_body, Button, ChatNotifier, MessageBody, NotifyError, SendOutcome};

pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    pub date: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub channel_post: Option<Message>,
}

/// Chats seen in `updates`, first occurrence order.
pub fn distinct_chats(updates: &[Update]) -> Vec<Chat> {
    let mut chats: Vec<Chat> = Vec::new();
    for msg in updates.iter().flat_map(|u| u.message.iter().chain(u.channel_post.iter())) {
        if !chats.iter().any(|c| c.id == msg.chat.id) {
            chats.push(msg.chat.clone());
        }
    }
    chats
}

/// Form body for plain sends; JSON when a button needs `reply_markup`.
pub fn build_message_body(chat_id: &str, text: &str, markdown: bool, button: Option<&Button>) -> MessageBody {
    match button {
        Some(button) => {
            let mut body = json!({
                "chat_id": chat_id,
                "text": text,
                "disable_web_page_preview": false,
                "reply_markup": {
                    "inline_keyboard": [[{ "text": button.text, "url": button.url }]]
                }
            });
            if markdown {
                body["parse_mode"] = json!("Markdown");
            }
            MessageBody::Json(body)
        }
        None => {
            let mut fields = vec![("chat_id", chat_id.to_string()), ("text", text.to_string())];
            if markdown {
                fields.push(("parse_mode", "Markdown".to_string()));
            }
            fields.push(("disable_web_page_preview", "false".to_string()));
            MessageBody::Form(fields)
        }
    }
}

/// Decodes a Bot API reply. Non-2xx and `ok: false` are errors.
fn decode_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, NotifyError> {
    let parsed: Result<ApiResponse<T>, _> = serde_json::from_str(body);

    if !status.is_success() {
        let description = parsed
            .ok()
            .and_then(|r| r.description)
            .unwrap_or_else(|| body.chars().take(200).collect());
        return Err(NotifyError::Api {
            status: status.as_u16(),
            description,
        });
    }

    let response = parsed.map_err(|e| NotifyError::Rejected(format!("unreadable response: {}", e)))?;
    if !response.ok {
        return Err(NotifyError::Rejected(
            response.description.unwrap_or_else(|| "ok=false".to_string()),
        ));
    }
    response
        .result
        .ok_or_else(|| NotifyError::Rejected("missing result".to_string()))
}

pub struct TelegramClient {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    retry: RetryPolicy,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifyError> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.trim().to_string(),
            chat_id: config.chat_id.trim().to_string(),
            retry: RetryPolicy::linear(3, Duration::from_millis(config.retry_unit_ms)),
        })
    }

    pub fn has_token(&self) -> bool {
        !self.bot_token.is_empty()
    }

    pub fn default_chat(&self) -> &str {
        &self.chat_id
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    fn require_token(&self) -> Result<(), NotifyError> {
        if self.has_token() {
            Ok(())
        } else {
            Err(NotifyError::InvalidInput("telegram bot token not configured".to_string()))
        }
    }

    async fn post<T: DeserializeOwned>(&self, method: &str, body: &MessageBody) -> Result<T, NotifyError> {
        let url = self.method_url(method);
        let label = format!("telegram {}", method);
        self.retry
            .run(
                &label,
                || async {
                    let (status, text) = post_body(&self.client, &url, body).await?;
                    decode_response(status, &text)
                },
                NotifyError::is_transient,
            )
            .await
    }

    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        markdown: bool,
        button: Option<&Button>,
    ) -> Result<SendOutcome, NotifyError> {
        if !self.has_token() || chat_id.trim().is_empty() {
            tracing::warn!("⚠️ Telegram not configured (bot token or chat id missing), message skipped");
            return Ok(SendOutcome::Skipped);
        }

        let body = build_message_body(chat_id, text, markdown, button);
        let _: serde_json::Value = self.post("sendMessage", &body).await?;
        tracing::debug!("📨 Telegram message sent to {} ({} chars)", chat_id, text.chars().count());
        Ok(SendOutcome::Sent)
    }

    pub async fn send_text_to(&self, chat_id: &str, text: &str, markdown: bool) -> Result<SendOutcome, NotifyError> {
        self.send_message(chat_id, text, markdown, None).await
    }

    pub async fn send_text_with_button(
        &self,
        chat_id: &str,
        text: &str,
        markdown: bool,
        button: &Button,
    ) -> Result<SendOutcome, NotifyError> {
        self.send_message(chat_id, text, markdown, Some(button)).await
    }

    pub async fn send_photo_url(&self, chat_id: &str, photo_url: &str, caption: &str) -> Result<SendOutcome, NotifyError> {
        if !self.has_token() || chat_id.trim().is_empty() {
            tracing::warn!("⚠️ Telegram not configured, photo skipped");
            return Ok(SendOutcome::Skipped);
        }

        let mut fields = vec![("chat_id", chat_id.to_string()), ("photo", photo_url.to_string())];
        if !caption.is_empty() {
            fields.push(("caption", caption.to_string()));
            fields.push(("parse_mode", "Markdown".to_string()));
        }
        let _: serde_json::Value = self.post("sendPhoto", &MessageBody::Form(fields)).await?;
        Ok(SendOutcome::Sent)
    }

    /// Uploads a local image as multipart form data.
    pub async fn send_photo_file(&self, chat_id: &str, path: &Path, caption: &str) -> Result<SendOutcome, NotifyError> {
        if !self.has_token() || chat_id.trim().is_empty() {
            tracing::warn!("⚠️ Telegram not configured, photo skipped");
            return Ok(SendOutcome::Skipped);
        }

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("photo.png")
            .to_string();
        let url = self.method_url("sendPhoto");

        let _: serde_json::Value = self
            .retry
            .run(
                "telegram sendPhoto",
                || async {
                    let mut form = Form::new()
                        .text("chat_id", chat_id.to_string())
                        .part("photo", Part::bytes(bytes.clone()).file_name(file_name.clone()));
                    if !caption.is_empty() {
                        form = form
                            .text("caption", caption.to_string())
                            .text("parse_mode", "Markdown");
                    }
                    let resp = self.client.post(&url).multipart(form).send().await?;
                    let status = resp.status();
                    let text = resp.text().await?;
                    decode_response(status, &text)
                },
                NotifyError::is_transient,
            )
            .await?;
        Ok(SendOutcome::Sent)
    }

    pub async fn get_updates(&self) -> Result<Vec<Update>, NotifyError> {
        self.require_token()?;
        let url = self.method_url("getUpdates");
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        decode_response(status, &text)
    }

    pub async fn get_chat(&self, chat_id: &str) -> Result<Chat, NotifyError> {
        self.require_token()?;
        if chat_id.trim().is_empty() {
            return Err(NotifyError::InvalidInput("chat id is empty".to_string()));
        }
        let body = MessageBody::Form(vec![("chat_id", chat_id.to_string())]);
        self.post("getChat", &body).await
    }
}

#[async_trait]
impl ChatNotifier for TelegramClient {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn style(&self) -> MessageStyle {
        MessageStyle::Markdown
    }

    fn max_message_len(&self) -> usize {
        TELEGRAM_MESSAGE_LIMIT
    }

    async fn send_text(&self, text: &str, button: Option<&Button>) -> Result<SendOutcome, NotifyError> {
        self.send_message(&self.chat_id, text, true, button).await
    }
}
