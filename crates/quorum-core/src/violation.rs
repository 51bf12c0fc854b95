//! Violations: append-only audit records of suspicious, rejected check-ins.
//!
//! A violation is written once and never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

/// The typed payload of a violation. The variant name is the `type`
/// discriminant stored alongside the JSON details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details", rename_all = "snake_case")]
pub enum ViolationDetails {
  /// The submitted position was outside the session geofence.
  OutOfRange {
    distance_meters: u64,
    radius_meters:   u32,
  },
  /// The fingerprint was already used by another student in this session.
  DuplicateDevice {
    fingerprint:          String,
    original_student_id:  String,
    attempted_student_id: String,
  },
}

impl ViolationDetails {
  /// The discriminant string stored in the `type` column.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::OutOfRange { .. } => "out_of_range",
      Self::DuplicateDevice { .. } => "duplicate_device",
    }
  }

  /// Serialise the inner payload (without the type tag) for storage.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("details").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Rebuild from a stored discriminant and JSON payload.
  pub fn from_parts(discriminant: &str, details: serde_json::Value) -> Result<Self> {
    let wrapped = serde_json::json!({ "type": discriminant, "details": details });
    Ok(serde_json::from_value(wrapped)?)
  }
}

/// A persisted violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
  pub violation_id:  Uuid,
  pub session_id:    Uuid,
  /// University id of the student whose attempt was rejected.
  pub university_id: String,
  pub student_name:  String,
  #[serde(flatten)]
  pub details:       ViolationDetails,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::record_violation`].
/// `created_at` is always set by the store.
#[derive(Debug, Clone)]
pub struct NewViolation {
  pub session_id:    Uuid,
  pub university_id: String,
  pub student_name:  String,
  pub details:       ViolationDetails,
}

impl NewViolation {
  pub fn new(
    session_id: Uuid,
    university_id: impl Into<String>,
    student_name: impl Into<String>,
    details: ViolationDetails,
  ) -> Self {
    Self {
      session_id,
      university_id: university_id.into(),
      student_name: student_name.into(),
      details,
    }
  }
}
