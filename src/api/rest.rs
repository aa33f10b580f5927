use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use crate::models::{PoolRecord, TokenRef};
use crate::notify::telegram::{distinct_chats, Chat};
use crate::notify::{Button, NotifyError, SendOutcome, TelegramClient};
use crate::services::{MessageFormatter, MessageStyle, SeenPoolStore, SnapshotStore, StoreError};
use crate::sources::FailoverChain;

pub struct AppState {
    pub chain: Arc<FailoverChain>,
    pub seen: Arc<SeenPoolStore>,
    pub snapshot: Arc<SnapshotStore>,
    pub telegram: Arc<TelegramClient>,
    pub formatter: MessageFormatter,
    pub started_at: DateTime<Utc>,
}

/// `{ code, message, data }` envelope used by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        })
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            code: self.status.as_u16(),
            message: self.message,
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

impl From<NotifyError> for ApiError {
    fn from(e: NotifyError) -> Self {
        let status = match &e {
            NotifyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            NotifyError::Api { .. } | NotifyError::Rejected(_) => StatusCode::BAD_GATEWAY,
            NotifyError::Transient(_) | NotifyError::Transport(_) => StatusCode::GATEWAY_TIMEOUT,
            NotifyError::Io(_) | NotifyError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> ApiResult<serde_json::Value> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Ok(ApiResponse::ok(serde_json::json!({
        "status": "ok",
        "uptime_secs": uptime,
        "sources": state.chain.source_names(),
        "fetch": state.chain.stats(),
        "snapshot": state.snapshot.exists(),
    })))
}

/// GET /pools - last snapshot
async fn get_pools(State(state): State<Arc<AppState>>) -> ApiResult<Vec<PoolRecord>> {
    Ok(ApiResponse::ok(state.snapshot.load()?))
}

/// GET /pools/seen - ids already announced today
async fn get_seen(State(state): State<Arc<AppState>>) -> ApiResult<Vec<String>> {
    let mut ids: Vec<String> = state.seen.seen_today()?.into_iter().collect();
    ids.sort();
    Ok(ApiResponse::ok(ids))
}

/// GET /telegram/updates - chats that have talked to the bot
async fn get_updates(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Chat>> {
    let updates = state.telegram.get_updates().await?;
    Ok(ApiResponse::ok(distinct_chats(&updates)))
}

/// GET /telegram/chat/:chat_id
async fn get_chat(State(state): State<Arc<AppState>>, Path(chat_id): Path<String>) -> ApiResult<Chat> {
    Ok(ApiResponse::ok(state.telegram.get_chat(&chat_id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct TestMessageParams {
    pub chat_id: Option<String>,
    pub text: Option<String>,
    pub button_text: Option<String>,
    pub button_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PhotoParams {
    pub chat_id: Option<String>,
    /// Remote image, sent by URL.
    pub url: Option<String>,
    /// Local file, uploaded as multipart.
    pub path: Option<String>,
    #[serde(default)]
    pub caption: String,
}

#[derive(Debug, Serialize)]
pub struct TestMessageResult {
    pub chat_id: String,
    pub sent: bool,
}

fn sample_pool() -> PoolRecord {
    PoolRecord {
        id: "0x0000000000000000000000000000000000000000".to_string(),
        name: "TEST/USDT".to_string(),
        token0: TokenRef::new("TEST", "0x0000000000000000000000000000000000000001"),
        token1: TokenRef::new("USDT", "0x55d398326f99059fF775485246999027B3197955"),
        tvl: 125_000.0,
        volume_24h: 480_000.0,
        fees_24h: 480.0,
        apr: 140.16,
        fee_tier: 0.01,
        protocol: "Uniswap".to_string(),
        version: "v4".to_string(),
        chain_id: Some(56),
        chain_name: "bsc".to_string(),
        contract_address: "0x0000000000000000000000000000000000000001".to_string(),
        url: "https://kyberswap.com/earn/pools".to_string(),
        source: "test".to_string(),
    }
}

fn resolve_chat(state: &AppState, chat_id: Option<String>) -> Result<String, ApiError> {
    let chat_id = chat_id
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| state.telegram.default_chat().to_string());
    if chat_id.is_empty() {
        return Err(NotifyError::InvalidInput("no chat_id given and none configured".to_string()).into());
    }
    Ok(chat_id)
}

async fn send_test(state: &AppState, params: TestMessageParams) -> ApiResult<TestMessageResult> {
    let chat_id = resolve_chat(state, params.chat_id)?;
    let button = Button::from_parts(
        params.button_text.as_deref().unwrap_or_default(),
        params.button_url.as_deref().unwrap_or_default(),
    );

    let text = params.text.unwrap_or_else(|| {
        state
            .formatter
            .format_pools(&[sample_pool()], false, MessageStyle::Markdown)
    });
    let outcome = match &button {
        Some(button) => state.telegram.send_text_with_button(&chat_id, &text, true, button).await?,
        None => state.telegram.send_text_to(&chat_id, &text, true).await?,
    };
    Ok(ApiResponse::ok(TestMessageResult {
        chat_id,
        sent: outcome == SendOutcome::Sent,
    }))
}

/// POST /telegram/photo - `url` wins over `path` when both are given
async fn send_photo(
    State(state): State<Arc<AppState>>,
    Json(params): Json<PhotoParams>,
) -> ApiResult<TestMessageResult> {
    let chat_id = resolve_chat(&state, params.chat_id)?;
    let outcome = match (params.url.filter(|u| !u.is_empty()), params.path.filter(|p| !p.is_empty())) {
        (Some(url), _) => state.telegram.send_photo_url(&chat_id, &url, &params.caption).await?,
        (None, Some(path)) => {
            state
                .telegram
                .send_photo_file(&chat_id, &PathBuf::from(path), &params.caption)
                .await?
        }
        (None, None) => {
            return Err(NotifyError::InvalidInput("either url or path is required".to_string()).into());
        }
    };
    Ok(ApiResponse::ok(TestMessageResult {
        chat_id,
        sent: outcome == SendOutcome::Sent,
    }))
}

/// GET /telegram/test?chat_id=..&text=..
async fn test_message_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TestMessageParams>,
) -> ApiResult<TestMessageResult> {
    send_test(&state, params).await
}

/// POST /telegram/test with an optional JSON body
async fn test_message_post(
    State(state): State<Arc<AppState>>,
    body: Option<Json<TestMessageParams>>,
) -> ApiResult<TestMessageResult> {
    let params = body.map(|Json(p)| p).unwrap_or_default();
    send_test(&state, params).await
}

pub fn create_rest_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/pools", get(get_pools))
        .route("/pools/seen", get(get_seen))
        .route("/telegram/updates", get(get_updates))
        .route("/telegram/chat/:chat_id", get(get_chat))
        .route("/telegram/test", get(test_message_get).post(test_message_post))
        .route("/telegram/photo", post(send_photo))
        .with_state(state)
}
