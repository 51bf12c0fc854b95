//! [`Engine`], the check-in verification engine over any [`AttendanceStore`].
//!
//! Token issuance lives in [`crate::issuer`], check-in validation in
//! [`crate::checkin`]; this module holds the engine itself and the
//! instructor-side session operations.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  attendance::AttendanceRecord,
  config::EngineConfig,
  geo::Coordinates,
  session::{CreateSession, NewSession, Session, SessionInfo, SessionSummary},
  store::AttendanceStore,
  violation::Violation,
};

/// Issues tokens and verifies check-ins for sessions held in `S`.
///
/// The engine keeps no per-session state of its own; every call is an
/// independent unit of work against the store.
pub struct Engine<S> {
  store:  S,
  config: EngineConfig,
}

impl<S: AttendanceStore> Engine<S> {
  pub fn new(store: S, config: EngineConfig) -> Self { Self { store, config } }

  pub fn store(&self) -> &S { &self.store }

  pub fn config(&self) -> &EngineConfig { &self.config }

  /// Start a new active session at the current time.
  pub async fn create_session(&self, input: CreateSession) -> Result<Session> {
    self.create_session_at(input, Utc::now()).await
  }

  pub async fn create_session_at(
    &self,
    input: CreateSession,
    now: DateTime<Utc>,
  ) -> Result<Session> {
    if input.duration_minutes == 0 {
      return Err(Error::InvalidRequest(
        "Session duration must be at least one minute".into(),
      ));
    }

    let center = match (input.latitude, input.longitude) {
      (Some(latitude), Some(longitude)) => {
        let c = Coordinates::new(latitude, longitude);
        if !c.is_valid() {
          return Err(Error::InvalidRequest(
            "Session location is out of range".into(),
          ));
        }
        Some(c)
      }
      (None, None) => None,
      _ => {
        return Err(Error::InvalidRequest(
          "Latitude and longitude must be given together".into(),
        ));
      }
    };

    if input.radius_meters == Some(0) {
      return Err(Error::InvalidRequest(
        "Geofence radius must be positive".into(),
      ));
    }

    let rotation_interval_seconds = match input.rotation_interval_seconds {
      Some(0) => {
        return Err(Error::InvalidRequest(
          "Rotation interval must be positive".into(),
        ));
      }
      Some(secs) => secs,
      None => self.config.default_rotation_interval_seconds,
    };

    let new = NewSession {
      group_id: input.group_id,
      title: input
        .title
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty()),
      duration_minutes: input.duration_minutes,
      started_at: now,
      center,
      radius_meters: input.radius_meters,
      qr_rotating: input.qr_rotating.unwrap_or(true),
      rotation_interval_seconds,
    };

    let session = self
      .store
      .create_session(new)
      .await
      .map_err(Error::storage)?;

    tracing::info!(
      session_id = %session.session_id,
      group_id = %session.group_id,
      expires_at = %session.expires_at,
      "session started"
    );
    Ok(session)
  }

  /// End a session early. Ending an already-inactive session is a no-op.
  pub async fn end_session(&self, id: Uuid) -> Result<()> {
    self.load_session(id).await?;
    if self
      .store
      .deactivate_session(id)
      .await
      .map_err(Error::storage)?
    {
      tracing::info!(session_id = %id, "session ended by instructor");
    }
    Ok(())
  }

  /// Whether the session is geofenced, so a client knows to acquire a
  /// location before submitting.
  pub async fn session_info(&self, id: Uuid) -> Result<SessionInfo> {
    let session = self.load_session(id).await?;
    Ok(SessionInfo {
      has_location:  session.center.is_some(),
      radius_meters: session
        .radius_meters
        .unwrap_or(self.config.default_radius_meters),
    })
  }

  /// All sessions of a group with their attendance counts, newest first.
  /// Sessions found past their expiry are deactivated on the way.
  pub async fn list_sessions(&self, group_id: Uuid) -> Result<Vec<SessionSummary>> {
    self.list_sessions_at(group_id, Utc::now()).await
  }

  pub async fn list_sessions_at(
    &self,
    group_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Vec<SessionSummary>> {
    let sessions = self
      .store
      .list_sessions(group_id)
      .await
      .map_err(Error::storage)?;

    let mut out = Vec::with_capacity(sessions.len());
    for mut session in sessions {
      if session.is_active && session.is_expired_at(now) {
        self.expire(&session).await?;
        session.is_active = false;
      }
      let attendance_count = self
        .store
        .count_attendance(session.session_id)
        .await
        .map_err(Error::storage)?;
      out.push(SessionSummary { session, attendance_count });
    }
    Ok(out)
  }

  /// Attendance records of a session, ordered by scan time.
  pub async fn attendance(&self, id: Uuid) -> Result<Vec<AttendanceRecord>> {
    self.load_session(id).await?;
    self.store.list_attendance(id).await.map_err(Error::storage)
  }

  /// The violation audit log of a session, oldest first.
  pub async fn violations(&self, id: Uuid) -> Result<Vec<Violation>> {
    self.load_session(id).await?;
    self.store.list_violations(id).await.map_err(Error::storage)
  }

  // ── Shared helpers ──────────────────────────────────────────────────────

  pub(crate) async fn load_session(&self, id: Uuid) -> Result<Session> {
    self
      .store
      .get_session(id)
      .await
      .map_err(Error::storage)?
      .ok_or(Error::SessionNotFound(id))
  }

  /// Persist the lazy active→inactive transition. Idempotent: the store only
  /// writes if the session is still active.
  pub(crate) async fn expire(&self, session: &Session) -> Result<()> {
    if self
      .store
      .deactivate_session(session.session_id)
      .await
      .map_err(Error::storage)?
    {
      tracing::info!(
        session_id = %session.session_id,
        expires_at = %session.expires_at,
        "session expired"
      );
    }
    Ok(())
  }
}
