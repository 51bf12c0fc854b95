//! Check-in validation.
//!
//! A check-in runs through an ordered list of gates. The first gate that
//! fails decides the outcome, and no later gate runs, so a rejected attempt
//! leaves nothing behind except (for geofence and device-collision
//! rejections) its violation record.
//!
//! 1. presence of session id, university id and token
//! 2. session lookup
//! 3. liveness (ended, or lazily expired)
//! 4. token freshness
//! 5. roster membership
//! 6. geofence, if the session has a center
//! 7. device-fingerprint collision, if a fingerprint was sent
//! 8. duplicate attendance
//! 9. commit

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  attendance::{AttendanceRecord, NewAttendance, RecordOutcome},
  engine::Engine,
  geo::{Coordinates, Placement},
  roster::Student,
  session::Session,
  store::AttendanceStore,
  violation::{NewViolation, ViolationDetails},
};

/// A student's check-in attempt as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckIn {
  pub session_id:    String,
  pub university_id: String,
  pub token:         String,
  pub location:      Option<Coordinates>,
  /// Opaque client-derived device identifier; a heuristic, never trusted.
  pub fingerprint:   Option<String>,
}

/// A successful check-in.
#[derive(Debug, Clone)]
pub struct CheckedIn {
  pub student_name: String,
  pub message:      String,
  pub record:       AttendanceRecord,
}

impl<S: AttendanceStore> Engine<S> {
  /// Validate and record a check-in at the current time.
  pub async fn check_in(&self, attempt: CheckIn) -> Result<CheckedIn> {
    self.check_in_at(attempt, Utc::now()).await
  }

  pub async fn check_in_at(
    &self,
    attempt: CheckIn,
    now: DateTime<Utc>,
  ) -> Result<CheckedIn> {
    let result = self.run_gates(&attempt, now).await;
    match &result {
      Ok(done) => tracing::info!(
        session_id = %done.record.session_id,
        university_id = %done.record.university_id,
        "attendance recorded"
      ),
      Err(e) => tracing::info!(
        session_id = %attempt.session_id,
        university_id = %attempt.university_id,
        kind = %e.kind(),
        "check-in rejected"
      ),
    }
    result
  }

  async fn run_gates(&self, attempt: &CheckIn, now: DateTime<Utc>) -> Result<CheckedIn> {
    // 1. Presence.
    let session_ref = attempt.session_id.trim();
    let university_id = attempt.university_id.trim();
    let token = attempt.token.trim();
    if session_ref.is_empty() || university_id.is_empty() || token.is_empty() {
      return Err(Error::InvalidRequest("Missing required fields".into()));
    }
    let fingerprint = attempt
      .fingerprint
      .as_deref()
      .map(str::trim)
      .filter(|f| !f.is_empty());

    // 2. Session lookup. An id that is not even a UUID names no session.
    let session_id = Uuid::parse_str(session_ref)
      .map_err(|_| Error::SessionNotFound(Uuid::nil()))?;
    let session = self.load_session(session_id).await?;

    // 3. Liveness.
    if !session.is_active {
      return Err(Error::SessionEnded);
    }
    if session.is_expired_at(now) {
      self.expire(&session).await?;
      return Err(Error::SessionExpired);
    }

    // 4. Token freshness. Any token issued for this session is honoured
    //    until its own expiry, however many rotations have happened since.
    let token_expiry = self
      .store()
      .token_expiry(session.session_id, token.to_owned())
      .await
      .map_err(Error::storage)?;
    if !token_expiry.is_some_and(|until| now <= until) {
      return Err(Error::TokenStale);
    }

    // 5. Roster membership.
    let student = self
      .store()
      .find_student(session.group_id, university_id.to_owned())
      .await
      .map_err(Error::storage)?
      .ok_or(Error::NotOnRoster)?;

    // 6. Geofence.
    self.check_geofence(&session, &student, attempt.location).await?;

    // 7. Device-fingerprint collision.
    if let Some(fp) = fingerprint {
      self.check_device(&session, &student, fp).await?;
    }

    // 8. Duplicate attendance (fast path; the store's uniqueness constraint
    //    is the final authority at commit).
    if self
      .store()
      .find_attendance(session.session_id, student.student_id)
      .await
      .map_err(Error::storage)?
      .is_some()
    {
      return Err(Error::AlreadyCheckedIn);
    }

    // 9. Commit.
    let outcome = self
      .store()
      .record_attendance(NewAttendance {
        session_id:    session.session_id,
        student_id:    student.student_id,
        university_id: student.university_id.clone(),
        scanned_at:    now,
        fingerprint:   fingerprint.map(str::to_owned),
      })
      .await
      .map_err(Error::storage)?;

    match outcome {
      RecordOutcome::Recorded(record) => Ok(CheckedIn {
        student_name: student.name,
        message: "Attendance recorded successfully!".into(),
        record,
      }),
      RecordOutcome::AlreadyPresent => Err(Error::AlreadyCheckedIn),
    }
  }

  async fn check_geofence(
    &self,
    session: &Session,
    student: &Student,
    location: Option<Coordinates>,
  ) -> Result<()> {
    let Some(fence) = session.geofence(self.config().default_radius_meters) else {
      return Ok(());
    };
    let location = location
      .filter(Coordinates::is_valid)
      .ok_or(Error::LocationRequired)?;

    match fence.place(&location) {
      Placement::Inside { .. } => Ok(()),
      Placement::Outside { distance_meters } => {
        self
          .record_violation(NewViolation::new(
            session.session_id,
            student.university_id.as_str(),
            student.name.as_str(),
            ViolationDetails::OutOfRange {
              distance_meters,
              radius_meters: fence.radius_meters,
            },
          ))
          .await;
        Err(Error::OutOfRange {
          distance_meters,
          radius_meters: fence.radius_meters,
        })
      }
    }
  }

  async fn check_device(
    &self,
    session: &Session,
    student: &Student,
    fingerprint: &str,
  ) -> Result<()> {
    let Some(earlier) = self
      .store()
      .find_attendance_by_fingerprint(session.session_id, fingerprint.to_owned())
      .await
      .map_err(Error::storage)?
    else {
      return Ok(());
    };

    // The same student retrying from the same device is not a collision.
    if earlier.university_id == student.university_id {
      return Ok(());
    }

    self
      .record_violation(NewViolation::new(
        session.session_id,
        student.university_id.as_str(),
        student.name.as_str(),
        ViolationDetails::DuplicateDevice {
          fingerprint:          fingerprint.to_owned(),
          original_student_id:  earlier.university_id,
          attempted_student_id: student.university_id.clone(),
        },
      ))
      .await;
    Err(Error::DuplicateDevice)
  }
}
