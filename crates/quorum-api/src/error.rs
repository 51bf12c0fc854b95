//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use quorum_core::ErrorKind;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub quorum_core::Error);

/// A body that is not JSON, or not the expected shape, is an invalid request
/// like any other and gets the same envelope.
impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self(quorum_core::Error::InvalidRequest(rejection.body_text()))
  }
}

/// The HTTP status a rejection of `kind` is reported with.
pub fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::NotFound => StatusCode::NOT_FOUND,
    ErrorKind::InvalidRequest
    | ErrorKind::SessionEnded
    | ErrorKind::SessionExpired
    | ErrorKind::TokenStale
    | ErrorKind::NotOnRoster
    | ErrorKind::LocationRequired => StatusCode::BAD_REQUEST,
    ErrorKind::OutOfRange | ErrorKind::DuplicateDevice => StatusCode::FORBIDDEN,
    ErrorKind::AlreadyCheckedIn => StatusCode::CONFLICT,
    ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let kind = self.0.kind();
    let status = status_for(kind);

    let message = if kind == ErrorKind::StorageFailure {
      tracing::error!(error = %self.0, "request failed on storage");
      "Something went wrong. Please try again.".to_owned()
    } else {
      self.0.to_string()
    };

    let body = if kind == ErrorKind::AlreadyCheckedIn {
      json!({ "error": message, "kind": kind, "already_checked_in": true })
    } else {
      json!({ "error": message, "kind": kind })
    };
    (status, Json(body)).into_response()
  }
}
