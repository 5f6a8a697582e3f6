//! HTTP endpoint handlers. These are thin wrappers that forward to the chat controller
//! or the store. Each handler is instrumented and logs basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{error, info, instrument};

use crate::bot::ChatContext;
use crate::error::{EngineError, ErrorKind};
use crate::protocol::*;
use crate::state::AppState;
use crate::transport::BufferedTransport;

const DEFAULT_RECENT_LIMIT: i64 = 3;
const MAX_RECENT_LIMIT: i64 = 50;

/// Error body + status for API callers.
pub struct ApiError {
  status: StatusCode,
  code: &'static str,
  message: String,
}

impl ApiError {
  pub fn not_found(message: impl Into<String>) -> Self {
    Self { status: StatusCode::NOT_FOUND, code: "NOT_FOUND", message: message.into() }
  }
}

impl From<EngineError> for ApiError {
  fn from(e: EngineError) -> Self {
    let (status, code) = match (&e, e.kind()) {
      (EngineError::ExerciseNotFound(_) | EngineError::UserNotFound(_), _) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
      (EngineError::ExerciseClosed { .. }, _) => (StatusCode::CONFLICT, "EXERCISE_CLOSED"),
      (_, ErrorKind::Integrity) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
      (_, ErrorKind::Backend) => (StatusCode::BAD_GATEWAY, "BACKEND_ERROR"),
      (_, ErrorKind::Configuration) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR"),
      (_, ErrorKind::Storage) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
    };
    Self { status, code, message: e.to_string() }
  }
}

impl From<sqlx::Error> for ApiError {
  fn from(e: sqlx::Error) -> Self {
    EngineError::from(e).into()
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    if self.status.is_server_error() {
      error!(target: "lalang_backend", status = %self.status, code = self.code, error = %self.message, "API error");
    }
    (self.status, Json(ErrorOut { error: self.message, code: self.code })).into_response()
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, backend_configured: state.backend_configured })
}

/// Feed one chat event through the controller and return everything it sent back.
#[instrument(level = "info", skip(state, body))]
pub async fn http_post_chat_event(
  State(state): State<Arc<AppState>>,
  Path(chat_id): Path<i64>,
  Json(body): Json<ChatEventIn>,
) -> Result<Json<ChatEventOut>, ApiError> {
  let ctx = ChatContext { chat_id, username: body.username.unwrap_or_else(|| default_username(chat_id)) };
  let transport = BufferedTransport::new();
  if let Err(e) = state.bot.handle(&transport, &ctx, body.event).await {
    // The buffered transport never fails; keep whatever was queued regardless.
    error!(target: "lalang_backend", %chat_id, error = %e, "Chat event delivery failed");
  }
  let messages = transport.drain();
  info!(target: "lalang_backend", %chat_id, replies = messages.len(), "HTTP chat event handled");
  Ok(Json(ChatEventOut { messages }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_catalog(State(state): State<Arc<AppState>>) -> Result<Json<CatalogOut>, ApiError> {
  let mut languages = Vec::new();
  for language in state.store.catalog_languages().await? {
    let levels = state
      .store
      .catalog_levels(&language)
      .await?
      .into_iter()
      .map(|(label, level_number)| LevelOut { label, level_number })
      .collect();
    languages.push(LanguageOut { language, levels });
  }
  Ok(Json(CatalogOut { languages }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<i64>,
) -> Result<Json<ProgressOut>, ApiError> {
  if state.store.get_user(user_id).await?.is_none() {
    return Err(ApiError::not_found(format!("user {user_id} does not exist")));
  }
  let topics = state.store.progress_summary(user_id).await?;
  Ok(Json(ProgressOut { user_id, topics }))
}

#[instrument(level = "info", skip(state, q))]
pub async fn http_get_recent_exercises(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<i64>,
  Query(q): Query<RecentQuery>,
) -> Result<Json<RecentOut>, ApiError> {
  if state.store.get_user(user_id).await?.is_none() {
    return Err(ApiError::not_found(format!("user {user_id} does not exist")));
  }
  let limit = q.limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, MAX_RECENT_LIMIT);
  let exercises = state.store.recent_exercises(user_id, limit).await?;
  Ok(Json(RecentOut { user_id, exercises }))
}
