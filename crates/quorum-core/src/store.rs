//! The `AttendanceStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `quorum-store-sqlite`).
//! The engine consults it through single-round-trip reads and writes only; it
//! never assumes multi-statement transactions, so every method must be atomic
//! on its own.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  attendance::{AttendanceRecord, NewAttendance, RecordOutcome},
  roster::Student,
  session::{NewSession, Session},
  violation::{NewViolation, Violation},
};

/// Abstraction over the relational store backing the check-in engine.
///
/// Attendance records and violations are append-only. The only mutable
/// session fields are the token pair and the `is_active` flag.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AttendanceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Sessions ──────────────────────────────────────────────────────────

  /// Persist a new, active session with no token.
  fn create_session(
    &self,
    input: NewSession,
  ) -> impl Future<Output = Result<Session, Self::Error>> + Send + '_;

  /// Retrieve a session by id. Returns `None` if not found.
  fn get_session(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// All sessions of a group, newest first.
  fn list_sessions(
    &self,
    group_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Session>, Self::Error>> + Send + '_;

  /// Set `is_active = false` if the session is still active.
  ///
  /// Returns `true` if this call performed the transition. Calling it on an
  /// inactive or missing session is a no-op returning `false`.
  fn deactivate_session(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Install `token` as the current token, valid until `expires_at`.
  ///
  /// Every token ever issued for the session is kept with its own expiry.
  /// Re-installing a known token only moves that expiry.
  fn set_token(
    &self,
    id: Uuid,
    token: String,
    expires_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The expiry of `token` if it was issued for session `id`.
  fn token_expiry(
    &self,
    id: Uuid,
    token: String,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + '_;

  // ── Roster (read-only) ────────────────────────────────────────────────

  /// Find a student of `group_id` by university id.
  fn find_student(
    &self,
    group_id: Uuid,
    university_id: String,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + '_;

  fn count_students(
    &self,
    group_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Attendance ledger ─────────────────────────────────────────────────

  fn find_attendance(
    &self,
    session_id: Uuid,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Option<AttendanceRecord>, Self::Error>> + Send + '_;

  /// The earliest record in `session_id` carrying `fingerprint`, if any.
  fn find_attendance_by_fingerprint(
    &self,
    session_id: Uuid,
    fingerprint: String,
  ) -> impl Future<Output = Result<Option<AttendanceRecord>, Self::Error>> + Send + '_;

  /// Append a record. A uniqueness conflict on (session, student) is
  /// reported as [`RecordOutcome::AlreadyPresent`], not as an error.
  fn record_attendance(
    &self,
    input: NewAttendance,
  ) -> impl Future<Output = Result<RecordOutcome, Self::Error>> + Send + '_;

  fn count_attendance(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// All records of a session, ordered by `scanned_at`.
  fn list_attendance(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + '_;

  // ── Violations ────────────────────────────────────────────────────────

  /// Append a violation. The `created_at` timestamp is set by the store.
  fn record_violation(
    &self,
    input: NewViolation,
  ) -> impl Future<Output = Result<Violation, Self::Error>> + Send + '_;

  /// All violations of a session, ordered by `created_at`.
  fn list_violations(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Violation>, Self::Error>> + Send + '_;
}
