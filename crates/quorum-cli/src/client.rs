//! Async HTTP client wrapping the Quorum JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use quorum_core::{
  issuer::TokenResult,
  session::{Session, SessionInfo},
  violation::Violation,
};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// `POST /sessions/{id}/token` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
  #[serde(flatten)]
  pub result:       TokenResult,
  pub check_in_url: Option<String>,
}

/// One row of `GET /groups/{id}/sessions`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionRow {
  #[serde(flatten)]
  pub session:          Session,
  pub attendance_count: u64,
}

/// `POST /attend` body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AttendRequest {
  pub session_id:    Uuid,
  pub university_id: String,
  pub token:         String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub latitude:      Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub longitude:     Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub fingerprint:   Option<String>,
}

/// Outcome of a check-in as seen by the student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendOutcome {
  Recorded { student_name: String, message: String },
  AlreadyCheckedIn(String),
}

#[derive(Debug, Deserialize)]
struct Recorded {
  student_name: String,
  message:      String,
}

/// The `{error, kind, already_checked_in?}` body of a rejected request.
#[derive(Debug, Deserialize)]
struct Rejection {
  error:              String,
  #[serde(default)]
  already_checked_in: bool,
}

/// Async HTTP client for the Quorum JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
}

impl ApiClient {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url: base_url.into() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url.trim_end_matches('/'), path)
  }

  /// Decode a success body, or turn the server's `error` message into an
  /// `anyhow` error.
  async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
      return resp.json().await.with_context(|| format!("deserialising {what}"));
    }
    match resp.json::<Rejection>().await {
      Ok(r) => Err(anyhow!("{what} → {status}: {}", r.error)),
      Err(_) => Err(anyhow!("{what} → {status}")),
    }
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  /// `POST /sessions`
  pub async fn create_session(&self, input: &CreateSessionBody) -> Result<Session> {
    let resp = self
      .client
      .post(self.url("/sessions"))
      .json(input)
      .send()
      .await
      .context("POST /sessions failed")?;
    Self::decode(resp, "new session").await
  }

  /// `GET /groups/{group_id}/sessions`
  pub async fn list_sessions(&self, group_id: Uuid) -> Result<Vec<SessionRow>> {
    let resp = self
      .client
      .get(self.url(&format!("/groups/{group_id}/sessions")))
      .send()
      .await
      .context("GET /groups/{id}/sessions failed")?;
    Self::decode(resp, "sessions").await
  }

  /// `POST /sessions/{id}/token`
  pub async fn rotate(&self, session_id: Uuid) -> Result<TokenResponse> {
    let resp = self
      .client
      .post(self.url(&format!("/sessions/{session_id}/token")))
      .send()
      .await
      .context("POST /sessions/{id}/token failed")?;
    Self::decode(resp, "token").await
  }

  /// `GET /sessions/{id}/info`
  pub async fn info(&self, session_id: Uuid) -> Result<SessionInfo> {
    let resp = self
      .client
      .get(self.url(&format!("/sessions/{session_id}/info")))
      .send()
      .await
      .context("GET /sessions/{id}/info failed")?;
    Self::decode(resp, "session info").await
  }

  /// `POST /sessions/{id}/end`
  pub async fn end(&self, session_id: Uuid) -> Result<()> {
    let resp = self
      .client
      .post(self.url(&format!("/sessions/{session_id}/end")))
      .send()
      .await
      .context("POST /sessions/{id}/end failed")?;
    Self::decode::<serde_json::Value>(resp, "end session").await?;
    Ok(())
  }

  /// `GET /sessions/{id}/violations`
  pub async fn violations(&self, session_id: Uuid) -> Result<Vec<Violation>> {
    let resp = self
      .client
      .get(self.url(&format!("/sessions/{session_id}/violations")))
      .send()
      .await
      .context("GET /sessions/{id}/violations failed")?;
    Self::decode(resp, "violations").await
  }

  // ── Check-in ──────────────────────────────────────────────────────────────

  /// `POST /attend`. An "already checked in" rejection is reported as an
  /// outcome rather than an error.
  pub async fn attend(&self, req: &AttendRequest) -> Result<AttendOutcome> {
    let resp = self
      .client
      .post(self.url("/attend"))
      .json(req)
      .send()
      .await
      .context("POST /attend failed")?;

    let status = resp.status();
    if status.is_success() {
      let ok: Recorded = resp.json().await.context("deserialising check-in")?;
      return Ok(AttendOutcome::Recorded {
        student_name: ok.student_name,
        message:      ok.message,
      });
    }

    let rejection: Rejection = resp
      .json()
      .await
      .with_context(|| format!("check-in → {status}"))?;
    if rejection.already_checked_in {
      Ok(AttendOutcome::AlreadyCheckedIn(rejection.error))
    } else {
      Err(anyhow!("{}", rejection.error))
    }
  }
}

/// `POST /sessions` body. Optional fields are left out when unset so
/// the server applies its own defaults.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionBody {
  pub group_id:                  Uuid,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title:                     Option<String>,
  pub duration_minutes:          u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub latitude:                  Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub longitude:                 Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub radius_meters:             Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub qr_rotating:               Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rotation_interval_seconds: Option<u32>,
}
