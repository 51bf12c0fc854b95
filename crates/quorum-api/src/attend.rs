//! `POST /attend`: the student check-in endpoint.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use quorum_core::{checkin::CheckIn, geo::Coordinates, store::AttendanceStore};
use serde::{Deserialize, Serialize};

use crate::{ApiState, error::ApiError};

/// Body of `POST /attend`. Missing or null strings become empty so the
/// engine's presence check reports them, rather than the extractor.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AttendBody {
  pub session_id:    Option<String>,
  pub university_id: Option<String>,
  pub token:         Option<String>,
  pub latitude:      Option<f64>,
  pub longitude:     Option<f64>,
  pub fingerprint:   Option<String>,
}

impl From<AttendBody> for CheckIn {
  fn from(b: AttendBody) -> Self {
    let location = match (b.latitude, b.longitude) {
      (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
      _ => None,
    };
    CheckIn {
      session_id: b.session_id.unwrap_or_default(),
      university_id: b.university_id.unwrap_or_default(),
      token: b.token.unwrap_or_default(),
      location,
      fingerprint: b.fingerprint,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct AttendResponse {
  pub success:      bool,
  pub student_name: String,
  pub message:      String,
}

/// `POST /attend`
pub async fn handler<S>(
  State(state): State<ApiState<S>>,
  payload: Result<Json<AttendBody>, JsonRejection>,
) -> Result<Json<AttendResponse>, ApiError>
where
  S: AttendanceStore + 'static,
{
  let Json(body) = payload?;
  let done = state.engine.check_in(body.into()).await?;
  Ok(Json(AttendResponse {
    success:      true,
    student_name: done.student_name,
    message:      done.message,
  }))
}
