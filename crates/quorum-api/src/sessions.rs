//! Handlers for instructor- and display-facing session endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/sessions` | Body: [`CreateSession`]; returns 201 + the session |
//! | `GET`  | `/groups/{group_id}/sessions` | Newest first, with attendance counts |
//! | `POST` | `/sessions/{id}/token` | Rotate; adds `check_in_url` when a base URL is set |
//! | `GET`  | `/sessions/{id}/info` | `{has_location, radius_meters}` |
//! | `POST` | `/sessions/{id}/end` | Idempotent |
//! | `GET`  | `/sessions/{id}/attendance` | Ordered by scan time |
//! | `GET`  | `/sessions/{id}/violations` | Oldest first |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use quorum_core::{
  attendance::AttendanceRecord,
  issuer::{TokenResult, check_in_link},
  session::{CreateSession, SessionInfo, SessionSummary},
  store::AttendanceStore,
  violation::Violation,
};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /sessions`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  payload: Result<Json<CreateSession>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore + 'static,
{
  let Json(body) = payload?;
  let session = state.engine.create_session(body).await?;
  Ok((StatusCode::CREATED, Json(session)))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /groups/{group_id}/sessions`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Path(group_id): Path<Uuid>,
) -> Result<Json<Vec<SessionSummary>>, ApiError>
where
  S: AttendanceStore + 'static,
{
  Ok(Json(state.engine.list_sessions(group_id).await?))
}

// ─── Token ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TokenResponse {
  #[serde(flatten)]
  pub result:       TokenResult,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub check_in_url: Option<String>,
}

/// `POST /sessions/{id}/token`
pub async fn token<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<TokenResponse>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let result = state.engine.rotate(id).await?;
  let check_in_url = match (&state.base_url, &result.token) {
    (Some(base), Some(token)) => Some(check_in_link(base, id, token)),
    _ => None,
  };
  Ok(Json(TokenResponse { result, check_in_url }))
}

// ─── Info / end ───────────────────────────────────────────────────────────────

/// `GET /sessions/{id}/info`
pub async fn info<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SessionInfo>, ApiError>
where
  S: AttendanceStore + 'static,
{
  Ok(Json(state.engine.session_info(id).await?))
}

/// `POST /sessions/{id}/end`
pub async fn end<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError>
where
  S: AttendanceStore + 'static,
{
  state.engine.end_session(id).await?;
  Ok(Json(json!({ "success": true })))
}

// ─── Audit ────────────────────────────────────────────────────────────────────

/// `GET /sessions/{id}/attendance`
pub async fn attendance<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError>
where
  S: AttendanceStore + 'static,
{
  Ok(Json(state.engine.attendance(id).await?))
}

/// `GET /sessions/{id}/violations`
pub async fn violations<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Violation>>, ApiError>
where
  S: AttendanceStore + 'static,
{
  Ok(Json(state.engine.violations(id).await?))
}
