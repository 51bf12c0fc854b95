//! Token issuance: the rotating credential a display surface embeds in its
//! check-in link.
//!
//! The display polls [`Engine::rotate`] on a fixed cadence. Rotation is also
//! the authoritative point where an expired session is switched off.

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, engine::Engine, session::Session, store::AttendanceStore};

/// What a display surface receives from each poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResult {
  /// `None` once the session is no longer live.
  pub token:                     Option<String>,
  pub expired:                   bool,
  pub active:                    bool,
  pub attendance_count:          u64,
  pub total_students:            u64,
  /// Session-level expiry, not the token's.
  pub expires_at:                DateTime<Utc>,
  /// How often the display should poll to keep the rotation cadence.
  pub rotation_interval_seconds: u32,
}

/// Generate a fresh hex-encoded token from `bytes` bytes of OS randomness.
pub fn generate_token(bytes: usize) -> String {
  let mut buf = vec![0u8; bytes];
  OsRng.fill_bytes(&mut buf);
  hex::encode(buf)
}

/// The student-facing check-in link for `session_id` and `token`.
pub fn check_in_link(base_url: &str, session_id: Uuid, token: &str) -> String {
  format!(
    "{}/attend?session_id={session_id}&token={token}",
    base_url.trim_end_matches('/')
  )
}

impl<S: AttendanceStore> Engine<S> {
  /// Rotate (or refresh) the token of a session at the current time.
  pub async fn rotate(&self, id: Uuid) -> Result<TokenResult> {
    self.rotate_at(id, Utc::now()).await
  }

  pub async fn rotate_at(&self, id: Uuid, now: DateTime<Utc>) -> Result<TokenResult> {
    let session = self.load_session(id).await?;

    if session.is_expired_at(now) {
      self.expire(&session).await?;
      return self.ended(&session).await;
    }
    if !session.is_active {
      return self.ended(&session).await;
    }

    // A static session keeps its first token for its whole life, and each
    // later poll pushes its expiry out by the static TTL.
    let (token, token_expires_at) = match (&session.current_token, session.qr_rotating) {
      (Some(current), false) => (current.clone(), now + self.config().static_token_ttl()),
      _ => (
        generate_token(self.config().token_bytes()),
        now + session.rotation_interval() + self.config().token_grace(),
      ),
    };

    self
      .store()
      .set_token(id, token.clone(), token_expires_at)
      .await
      .map_err(Error::storage)?;

    tracing::debug!(
      session_id = %id,
      rotating = session.qr_rotating,
      token_expires_at = %token_expires_at,
      "token issued"
    );

    let (attendance_count, total_students) = self.counts(&session).await?;
    Ok(TokenResult {
      token: Some(token),
      expired: false,
      active: true,
      attendance_count,
      total_students,
      expires_at: session.expires_at,
      rotation_interval_seconds: session.rotation_interval_seconds,
    })
  }

  async fn ended(&self, session: &Session) -> Result<TokenResult> {
    let (attendance_count, total_students) = self.counts(session).await?;
    Ok(TokenResult {
      token: None,
      expired: true,
      active: false,
      attendance_count,
      total_students,
      expires_at: session.expires_at,
      rotation_interval_seconds: session.rotation_interval_seconds,
    })
  }

  async fn counts(&self, session: &Session) -> Result<(u64, u64)> {
    let attendance = self
      .store()
      .count_attendance(session.session_id)
      .await
      .map_err(Error::storage)?;
    let roster = self
      .store()
      .count_students(session.group_id)
      .await
      .map_err(Error::storage)?;
    Ok((attendance, roster))
  }
}
