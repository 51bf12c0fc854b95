//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings with fixed microsecond
//! precision, so lexical order is chronological order. UUIDs are stored as
//! hyphenated lowercase strings. Violation details are compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use quorum_core::{
  attendance::AttendanceRecord,
  geo::Coordinates,
  roster::Student,
  session::Session,
  violation::{Violation, ViolationDetails},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawSession::from_row`].
pub const SESSION_COLUMNS: &str = "session_id, group_id, title, duration_minutes, is_active,
   started_at, expires_at, current_token, token_expires_at,
   latitude, longitude, radius_meters, qr_rotating, rotation_interval_seconds";

/// Raw values read directly from a `sessions` row.
pub struct RawSession {
  pub session_id:                String,
  pub group_id:                  String,
  pub title:                     Option<String>,
  pub duration_minutes:          u32,
  pub is_active:                 bool,
  pub started_at:                String,
  pub expires_at:                String,
  pub current_token:             Option<String>,
  pub token_expires_at:          Option<String>,
  pub latitude:                  Option<f64>,
  pub longitude:                 Option<f64>,
  pub radius_meters:             Option<u32>,
  pub qr_rotating:               bool,
  pub rotation_interval_seconds: u32,
}

impl RawSession {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id:                row.get(0)?,
      group_id:                  row.get(1)?,
      title:                     row.get(2)?,
      duration_minutes:          row.get(3)?,
      is_active:                 row.get(4)?,
      started_at:                row.get(5)?,
      expires_at:                row.get(6)?,
      current_token:             row.get(7)?,
      token_expires_at:          row.get(8)?,
      latitude:                  row.get(9)?,
      longitude:                 row.get(10)?,
      radius_meters:             row.get(11)?,
      qr_rotating:               row.get(12)?,
      rotation_interval_seconds: row.get(13)?,
    })
  }

  pub fn into_session(self) -> Result<Session> {
    let center = match (self.latitude, self.longitude) {
      (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
      _ => None,
    };

    Ok(Session {
      session_id:                decode_uuid(&self.session_id)?,
      group_id:                  decode_uuid(&self.group_id)?,
      title:                     self.title,
      duration_minutes:          self.duration_minutes,
      is_active:                 self.is_active,
      started_at:                decode_dt(&self.started_at)?,
      expires_at:                decode_dt(&self.expires_at)?,
      current_token:             self.current_token,
      token_expires_at:          decode_opt_dt(self.token_expires_at)?,
      center,
      radius_meters:             self.radius_meters,
      qr_rotating:               self.qr_rotating,
      rotation_interval_seconds: self.rotation_interval_seconds,
    })
  }
}

/// Raw strings read directly from a `students` row.
pub struct RawStudent {
  pub student_id:    String,
  pub group_id:      String,
  pub university_id: String,
  pub name:          String,
}

impl RawStudent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      student_id:    row.get(0)?,
      group_id:      row.get(1)?,
      university_id: row.get(2)?,
      name:          row.get(3)?,
    })
  }

  pub fn into_student(self) -> Result<Student> {
    Ok(Student {
      student_id:    decode_uuid(&self.student_id)?,
      group_id:      decode_uuid(&self.group_id)?,
      university_id: self.university_id,
      name:          self.name,
    })
  }
}

/// Column list matching [`RawAttendance::from_row`].
pub const ATTENDANCE_COLUMNS: &str =
  "record_id, session_id, student_id, university_id, scanned_at, fingerprint";

/// Raw strings read directly from an `attendance_records` row.
pub struct RawAttendance {
  pub record_id:     String,
  pub session_id:    String,
  pub student_id:    String,
  pub university_id: String,
  pub scanned_at:    String,
  pub fingerprint:   Option<String>,
}

impl RawAttendance {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:     row.get(0)?,
      session_id:    row.get(1)?,
      student_id:    row.get(2)?,
      university_id: row.get(3)?,
      scanned_at:    row.get(4)?,
      fingerprint:   row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      record_id:     decode_uuid(&self.record_id)?,
      session_id:    decode_uuid(&self.session_id)?,
      student_id:    decode_uuid(&self.student_id)?,
      university_id: self.university_id,
      scanned_at:    decode_dt(&self.scanned_at)?,
      fingerprint:   self.fingerprint,
    })
  }
}

/// Raw strings read directly from a `violations` row.
pub struct RawViolation {
  pub violation_id:  String,
  pub session_id:    String,
  pub university_id: String,
  pub student_name:  String,
  pub kind:          String,
  pub details_json:  String,
  pub created_at:    String,
}

impl RawViolation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      violation_id:  row.get(0)?,
      session_id:    row.get(1)?,
      university_id: row.get(2)?,
      student_name:  row.get(3)?,
      kind:          row.get(4)?,
      details_json:  row.get(5)?,
      created_at:    row.get(6)?,
    })
  }

  pub fn into_violation(self) -> Result<Violation> {
    let details_json: serde_json::Value = serde_json::from_str(&self.details_json)?;
    Ok(Violation {
      violation_id:  decode_uuid(&self.violation_id)?,
      session_id:    decode_uuid(&self.session_id)?,
      university_id: self.university_id,
      student_name:  self.student_name,
      details:       ViolationDetails::from_parts(&self.kind, details_json)?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}
