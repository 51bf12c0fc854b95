//! The attendance ledger: at most one record per (session, student).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An immutable attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub record_id:     Uuid,
  pub session_id:    Uuid,
  pub student_id:    Uuid,
  /// Denormalised from the student at check-in time.
  pub university_id: String,
  pub scanned_at:    DateTime<Utc>,
  pub fingerprint:   Option<String>,
}

/// Input to [`crate::store::AttendanceStore::record_attendance`].
#[derive(Debug, Clone)]
pub struct NewAttendance {
  pub session_id:    Uuid,
  pub student_id:    Uuid,
  pub university_id: String,
  pub scanned_at:    DateTime<Utc>,
  pub fingerprint:   Option<String>,
}

/// Result of appending to the ledger. `AlreadyPresent` means the storage
/// uniqueness constraint on (session, student) rejected the insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
  Recorded(AttendanceRecord),
  AlreadyPresent,
}
