//! Session: one time-boxed attendance window for a group.
//!
//! A session is born active and only ever moves to inactive, either when an
//! instructor ends it or lazily, the first time a reader observes that
//! `expires_at` has passed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{Coordinates, Geofence};

/// A persisted attendance session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
  pub session_id:                Uuid,
  pub group_id:                  Uuid,
  pub title:                     Option<String>,
  pub duration_minutes:          u32,
  /// Monotonic: once `false`, never `true` again.
  pub is_active:                 bool,
  pub started_at:                DateTime<Utc>,
  /// Fixed at creation to `started_at + duration_minutes`.
  pub expires_at:                DateTime<Utc>,
  /// The most recently issued token. Earlier tokens stay valid until their
  /// own expiry; see [`crate::store::AttendanceStore::token_expiry`].
  pub current_token:             Option<String>,
  pub token_expires_at:          Option<DateTime<Utc>>,
  pub center:                    Option<Coordinates>,
  pub radius_meters:             Option<u32>,
  pub qr_rotating:               bool,
  pub rotation_interval_seconds: u32,
}

impl Session {
  /// `true` once `now` has reached `expires_at`, whatever `is_active` says.
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    now >= self.expires_at
  }

  /// Active and not yet expired.
  pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
    self.is_active && !self.is_expired_at(now)
  }

  /// The session's geofence, if it has a center.
  pub fn geofence(&self, default_radius_meters: u32) -> Option<Geofence> {
    self.center.map(|center| Geofence {
      center,
      radius_meters: self.radius_meters.unwrap_or(default_radius_meters),
    })
  }

  pub fn rotation_interval(&self) -> Duration {
    Duration::seconds(i64::from(self.rotation_interval_seconds))
  }
}

/// Input to [`crate::store::AttendanceStore::create_session`]. Every field is
/// already validated and defaulted by the engine.
#[derive(Debug, Clone)]
pub struct NewSession {
  pub group_id:                  Uuid,
  pub title:                     Option<String>,
  pub duration_minutes:          u32,
  pub started_at:                DateTime<Utc>,
  pub center:                    Option<Coordinates>,
  pub radius_meters:             Option<u32>,
  pub qr_rotating:               bool,
  pub rotation_interval_seconds: u32,
}

impl NewSession {
  pub fn expires_at(&self) -> DateTime<Utc> {
    self.started_at + Duration::minutes(i64::from(self.duration_minutes))
  }
}

/// Instructor request to start a session; optional fields fall back to the
/// engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSession {
  pub group_id:                  Uuid,
  pub title:                     Option<String>,
  pub duration_minutes:          u32,
  pub latitude:                  Option<f64>,
  pub longitude:                 Option<f64>,
  pub radius_meters:             Option<u32>,
  pub qr_rotating:               Option<bool>,
  pub rotation_interval_seconds: Option<u32>,
}

/// What a client needs to know before submitting a check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
  pub has_location:  bool,
  pub radius_meters: u32,
}

/// A session together with its attendance count, as listed for a group.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
  #[serde(flatten)]
  pub session:          Session,
  pub attendance_count: u64,
}
