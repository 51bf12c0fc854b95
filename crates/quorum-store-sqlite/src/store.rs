//! [`SqliteStore`], the SQLite implementation of [`AttendanceStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use quorum_core::{
  attendance::{AttendanceRecord, NewAttendance, RecordOutcome},
  roster::Student,
  session::{NewSession, Session},
  store::AttendanceStore,
  violation::{NewViolation, Violation},
};

use crate::{
  Error, Result,
  encode::{
    ATTENDANCE_COLUMNS, RawAttendance, RawSession, RawStudent, RawViolation,
    SESSION_COLUMNS, decode_dt, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

/// `true` if `err` is a UNIQUE or PRIMARY KEY constraint failure.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Quorum store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Add a roster entry. Roster management proper lives outside this
  /// system; this is the hook it (and tests) use to populate the table.
  pub async fn add_student(
    &self,
    group_id: Uuid,
    university_id: &str,
    name: &str,
  ) -> Result<Student> {
    let student = Student {
      student_id:    Uuid::new_v4(),
      group_id,
      university_id: university_id.to_owned(),
      name:          name.to_owned(),
    };

    let id_str    = encode_uuid(student.student_id);
    let group_str = encode_uuid(group_id);
    let uni       = student.university_id.clone();
    let name      = student.name.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO students (student_id, group_id, university_id, name)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, group_str, uni, name],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(Error::DuplicateStudent {
        group_id,
        university_id: student.university_id,
      });
    }
    Ok(student)
  }

  async fn query_attendance(
    &self,
    sql: String,
    params: Vec<String>,
  ) -> Result<Vec<AttendanceRecord>> {
    let raws: Vec<RawAttendance> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawAttendance::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttendance::into_record).collect()
  }

  async fn count(&self, sql: &'static str, id: Uuid) -> Result<u64> {
    let id_str = encode_uuid(id);
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(sql, rusqlite::params![id_str], |r| r.get(0))?)
      })
      .await?;
    Ok(n.max(0) as u64)
  }
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn create_session(&self, input: NewSession) -> Result<Session> {
    let session = Session {
      session_id:                Uuid::new_v4(),
      group_id:                  input.group_id,
      title:                     input.title.clone(),
      duration_minutes:          input.duration_minutes,
      is_active:                 true,
      started_at:                input.started_at,
      expires_at:                input.expires_at(),
      current_token:             None,
      token_expires_at:          None,
      center:                    input.center,
      radius_meters:             input.radius_meters,
      qr_rotating:               input.qr_rotating,
      rotation_interval_seconds: input.rotation_interval_seconds,
    };

    let id_str       = encode_uuid(session.session_id);
    let group_str    = encode_uuid(session.group_id);
    let title        = session.title.clone();
    let duration     = session.duration_minutes;
    let started_str  = encode_dt(session.started_at);
    let expires_str  = encode_dt(session.expires_at);
    let latitude     = session.center.map(|c| c.latitude);
    let longitude    = session.center.map(|c| c.longitude);
    let radius       = session.radius_meters;
    let rotating     = session.qr_rotating;
    let interval     = session.rotation_interval_seconds;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (
             session_id, group_id, title, duration_minutes, is_active,
             started_at, expires_at, latitude, longitude, radius_meters,
             qr_rotating, rotation_interval_seconds
           ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          rusqlite::params![
            id_str,
            group_str,
            title,
            duration,
            started_str,
            expires_str,
            latitude,
            longitude,
            radius,
            rotating,
            interval,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(session)
  }

  async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"),
            rusqlite::params![id_str],
            RawSession::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn list_sessions(&self, group_id: Uuid) -> Result<Vec<Session>> {
    let group_str = encode_uuid(group_id);

    let raws: Vec<RawSession> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SESSION_COLUMNS} FROM sessions
           WHERE group_id = ?1
           ORDER BY started_at DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![group_str], RawSession::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSession::into_session).collect()
  }

  async fn deactivate_session(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE sessions SET is_active = 0 WHERE session_id = ?1 AND is_active = 1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn set_token(
    &self,
    id:         Uuid,
    token:      String,
    expires_at: DateTime<Utc>,
  ) -> Result<()> {
    let id_str      = encode_uuid(id);
    let expires_str = encode_dt(expires_at);

    // The ledger row and the current-token columns move together.
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO session_tokens (session_id, token, expires_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (session_id, token) DO UPDATE SET expires_at = excluded.expires_at",
          rusqlite::params![id_str, token, expires_str],
        )?;
        tx.execute(
          "UPDATE sessions SET current_token = ?2, token_expires_at = ?3
           WHERE session_id = ?1",
          rusqlite::params![id_str, token, expires_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn token_expiry(&self, id: Uuid, token: String) -> Result<Option<DateTime<Utc>>> {
    let id_str = encode_uuid(id);

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT expires_at FROM session_tokens WHERE session_id = ?1 AND token = ?2",
            rusqlite::params![id_str, token],
            |r| r.get(0),
          )
          .optional()?)
      })
      .await?;

    raw.as_deref().map(decode_dt).transpose()
  }

  // ── Roster ────────────────────────────────────────────────────────────────

  async fn find_student(
    &self,
    group_id:      Uuid,
    university_id: String,
  ) -> Result<Option<Student>> {
    let group_str = encode_uuid(group_id);

    let raw: Option<RawStudent> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT student_id, group_id, university_id, name FROM students
             WHERE group_id = ?1 AND university_id = ?2",
            rusqlite::params![group_str, university_id],
            RawStudent::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawStudent::into_student).transpose()
  }

  async fn count_students(&self, group_id: Uuid) -> Result<u64> {
    self
      .count("SELECT COUNT(*) FROM students WHERE group_id = ?1", group_id)
      .await
  }

  // ── Attendance ledger ─────────────────────────────────────────────────────

  async fn find_attendance(
    &self,
    session_id: Uuid,
    student_id: Uuid,
  ) -> Result<Option<AttendanceRecord>> {
    let found = self
      .query_attendance(
        format!(
          "SELECT {ATTENDANCE_COLUMNS} FROM attendance_records
           WHERE session_id = ?1 AND student_id = ?2"
        ),
        vec![encode_uuid(session_id), encode_uuid(student_id)],
      )
      .await?;
    Ok(found.into_iter().next())
  }

  async fn find_attendance_by_fingerprint(
    &self,
    session_id:  Uuid,
    fingerprint: String,
  ) -> Result<Option<AttendanceRecord>> {
    let found = self
      .query_attendance(
        format!(
          "SELECT {ATTENDANCE_COLUMNS} FROM attendance_records
           WHERE session_id = ?1 AND fingerprint = ?2
           ORDER BY scanned_at
           LIMIT 1"
        ),
        vec![encode_uuid(session_id), fingerprint],
      )
      .await?;
    Ok(found.into_iter().next())
  }

  async fn record_attendance(&self, input: NewAttendance) -> Result<RecordOutcome> {
    let record = AttendanceRecord {
      record_id:     Uuid::new_v4(),
      session_id:    input.session_id,
      student_id:    input.student_id,
      university_id: input.university_id,
      scanned_at:    input.scanned_at,
      fingerprint:   input.fingerprint,
    };

    let record_str  = encode_uuid(record.record_id);
    let session_str = encode_uuid(record.session_id);
    let student_str = encode_uuid(record.student_id);
    let uni         = record.university_id.clone();
    let scanned_str = encode_dt(record.scanned_at);
    let fingerprint = record.fingerprint.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO attendance_records (
             record_id, session_id, student_id, university_id, scanned_at, fingerprint
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            record_str,
            session_str,
            student_str,
            uni,
            scanned_str,
            fingerprint,
          ],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if inserted {
      Ok(RecordOutcome::Recorded(record))
    } else {
      tracing::debug!(
        session_id = %record.session_id,
        student_id = %record.student_id,
        "attendance insert hit uniqueness constraint"
      );
      Ok(RecordOutcome::AlreadyPresent)
    }
  }

  async fn count_attendance(&self, session_id: Uuid) -> Result<u64> {
    self
      .count(
        "SELECT COUNT(*) FROM attendance_records WHERE session_id = ?1",
        session_id,
      )
      .await
  }

  async fn list_attendance(&self, session_id: Uuid) -> Result<Vec<AttendanceRecord>> {
    self
      .query_attendance(
        format!(
          "SELECT {ATTENDANCE_COLUMNS} FROM attendance_records
           WHERE session_id = ?1
           ORDER BY scanned_at"
        ),
        vec![encode_uuid(session_id)],
      )
      .await
  }

  // ── Violations ────────────────────────────────────────────────────────────

  async fn record_violation(&self, input: NewViolation) -> Result<Violation> {
    let violation = Violation {
      violation_id:  Uuid::new_v4(),
      session_id:    input.session_id,
      university_id: input.university_id,
      student_name:  input.student_name,
      details:       input.details,
      created_at:    Utc::now(),
    };

    let id_str       = encode_uuid(violation.violation_id);
    let session_str  = encode_uuid(violation.session_id);
    let uni          = violation.university_id.clone();
    let name         = violation.student_name.clone();
    let kind         = violation.details.discriminant().to_owned();
    let details_json = violation.details.to_json()?.to_string();
    let at_str       = encode_dt(violation.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO violations (
             violation_id, session_id, university_id, student_name,
             type, details_json, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id_str, session_str, uni, name, kind, details_json, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(violation)
  }

  async fn list_violations(&self, session_id: Uuid) -> Result<Vec<Violation>> {
    let session_str = encode_uuid(session_id);

    let raws: Vec<RawViolation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT violation_id, session_id, university_id, student_name,
                  type, details_json, created_at
           FROM violations
           WHERE session_id = ?1
           ORDER BY created_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![session_str], RawViolation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawViolation::into_violation).collect()
  }
}
