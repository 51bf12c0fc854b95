//! End-to-end engine scenarios run against the SQLite store.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use quorum_core::{
  Engine, Error, ErrorKind,
  checkin::CheckIn,
  config::EngineConfig,
  geo::{Coordinates, EARTH_RADIUS_METERS},
  session::{CreateSession, Session},
  store::AttendanceStore,
  violation::ViolationDetails,
};
use uuid::Uuid;

use crate::SqliteStore;

const CAIRO: Coordinates = Coordinates { latitude: 30.0444, longitude: 31.2357 };

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap() }

fn secs(n: i64) -> DateTime<Utc> { t0() + Duration::seconds(n) }

/// A point `meters` due north of `from`.
fn north_of(from: Coordinates, meters: f64) -> Coordinates {
  let d_lat = (meters / EARTH_RADIUS_METERS).to_degrees();
  Coordinates::new(from.latitude + d_lat, from.longitude)
}

struct Fixture {
  engine: Engine<SqliteStore>,
  group:  Uuid,
}

/// An engine over a fresh store with a three-student roster.
async fn fixture() -> Fixture {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  let group = Uuid::new_v4();
  for (uni, name) in [("u1", "Ada"), ("u2", "Bob"), ("u3", "Cleo")] {
    store.add_student(group, uni, name).await.unwrap();
  }
  Fixture { engine: Engine::new(store, EngineConfig::default()), group }
}

impl Fixture {
  /// A ten-minute rotating session started at `t0`, adjusted by `f`.
  async fn session(&self, f: impl FnOnce(&mut CreateSession)) -> Session {
    let mut input = CreateSession {
      group_id: self.group,
      duration_minutes: 10,
      ..Default::default()
    };
    f(&mut input);
    self.engine.create_session_at(input, t0()).await.unwrap()
  }

  async fn token(&self, session: &Session, at: DateTime<Utc>) -> String {
    self
      .engine
      .rotate_at(session.session_id, at)
      .await
      .unwrap()
      .token
      .expect("live session issues a token")
  }
}

fn attempt(session: &Session, university_id: &str, token: &str) -> CheckIn {
  CheckIn {
    session_id: session.session_id.to_string(),
    university_id: university_id.into(),
    token: token.into(),
    ..Default::default()
  }
}

fn geofenced(input: &mut CreateSession) {
  input.latitude = Some(CAIRO.latitude);
  input.longitude = Some(CAIRO.longitude);
  input.radius_meters = Some(100);
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_session_validates_input() {
  let fx = fixture().await;
  let create = |f: fn(&mut CreateSession)| {
    let mut input = CreateSession {
      group_id: fx.group,
      duration_minutes: 10,
      ..Default::default()
    };
    f(&mut input);
    input
  };

  let bad: [fn(&mut CreateSession); 5] = [
    |i| i.duration_minutes = 0,
    |i| i.latitude = Some(30.0),
    |i| {
      i.latitude = Some(95.0);
      i.longitude = Some(0.0);
    },
    |i| i.radius_meters = Some(0),
    |i| i.rotation_interval_seconds = Some(0),
  ];
  for f in bad {
    let err = fx.engine.create_session_at(create(f), t0()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)), "got {err:?}");
  }

  let session = fx
    .engine
    .create_session_at(create(|i| i.title = Some("  Week 3  ".into())), t0())
    .await
    .unwrap();
  assert_eq!(session.title.as_deref(), Some("Week 3"));
  assert!(session.qr_rotating);
  assert_eq!(session.rotation_interval_seconds, 15);
  assert_eq!(session.expires_at, t0() + Duration::minutes(10));
}

#[tokio::test]
async fn session_info_reports_geofence() {
  let fx = fixture().await;
  let open = fx.session(|_| {}).await;
  let fenced = fx.session(geofenced).await;

  let info = fx.engine.session_info(open.session_id).await.unwrap();
  assert!(!info.has_location);
  assert_eq!(info.radius_meters, 100);

  let info = fx.engine.session_info(fenced.session_id).await.unwrap();
  assert!(info.has_location);

  let err = fx.engine.session_info(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::SessionNotFound(_)));
}

#[tokio::test]
async fn list_sessions_expires_lazily_with_counts() {
  let fx = fixture().await;
  let session = fx.session(|_| {}).await;
  let token = fx.token(&session, t0()).await;
  fx.engine
    .check_in_at(attempt(&session, "u1", &token), secs(5))
    .await
    .unwrap();

  let listed = fx.engine.list_sessions_at(fx.group, secs(60)).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert!(listed[0].session.is_active);
  assert_eq!(listed[0].attendance_count, 1);

  let listed = fx.engine.list_sessions_at(fx.group, secs(601)).await.unwrap();
  assert!(!listed[0].session.is_active);

  let stored = fx.engine.store().get_session(session.session_id).await.unwrap().unwrap();
  assert!(!stored.is_active);
}

#[tokio::test]
async fn ended_session_refuses_tokens_and_check_ins() {
  let fx = fixture().await;
  let session = fx.session(|_| {}).await;
  let token = fx.token(&session, t0()).await;

  fx.engine.end_session(session.session_id).await.unwrap();
  // Ending twice is harmless.
  fx.engine.end_session(session.session_id).await.unwrap();

  let result = fx.engine.rotate_at(session.session_id, secs(1)).await.unwrap();
  assert!(result.expired);
  assert!(!result.active);
  assert!(result.token.is_none());

  let err = fx
    .engine
    .check_in_at(attempt(&session, "u1", &token), secs(2))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SessionEnded));

  let err = fx.engine.end_session(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::SessionNotFound(_)));
}

// ─── Token issuance ──────────────────────────────────────────────────────────

#[tokio::test]
async fn rotation_issues_fresh_tokens_with_counts() {
  let fx = fixture().await;
  let session = fx.session(|_| {}).await;

  let first = fx.engine.rotate_at(session.session_id, t0()).await.unwrap();
  let second = fx.engine.rotate_at(session.session_id, secs(15)).await.unwrap();

  assert!(first.active && !first.expired);
  assert_eq!(first.total_students, 3);
  assert_eq!(first.attendance_count, 0);
  assert_eq!(first.expires_at, session.expires_at);
  assert_eq!(first.rotation_interval_seconds, 15);
  let (a, b) = (first.token.unwrap(), second.token.unwrap());
  assert_ne!(a, b);
  assert!(a.len() >= 32);

  let err = fx.engine.rotate_at(Uuid::new_v4(), t0()).await.unwrap_err();
  assert!(matches!(err, Error::SessionNotFound(_)));
}

#[tokio::test]
async fn static_session_reuses_its_token() {
  let fx = fixture().await;
  let session = fx
    .session(|i| {
      i.qr_rotating = Some(false);
      i.duration_minutes = 90;
    })
    .await;

  // The first token starts out with a rotating token's lifetime.
  let first = fx.token(&session, t0()).await;
  let stored = fx.engine.store().get_session(session.session_id).await.unwrap().unwrap();
  assert_eq!(stored.token_expires_at, Some(secs(30)));

  let again = fx.token(&session, secs(20)).await;
  assert_eq!(first, again);
  let again = fx.token(&session, secs(600)).await;
  assert_eq!(first, again);
  let stored = fx.engine.store().get_session(session.session_id).await.unwrap().unwrap();
  assert_eq!(stored.token_expires_at, Some(secs(600 + 3600)));

  // Valid for an hour after the last refresh.
  fx.engine
    .check_in_at(attempt(&session, "u1", &first), secs(600 + 3600))
    .await
    .unwrap();
  let err = fx
    .engine
    .check_in_at(attempt(&session, "u2", &first), secs(600 + 3601))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::TokenStale));
}

#[tokio::test]
async fn lazy_expiry_is_idempotent() {
  let fx = fixture().await;
  let session = fx.session(|_| {}).await;
  let token = fx.token(&session, t0()).await;
  let expiry = session.expires_at;

  let err = fx
    .engine
    .check_in_at(attempt(&session, "u1", &token), expiry)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SessionExpired));

  for n in 0..3 {
    let at = expiry + Duration::seconds(n);
    let result = fx.engine.rotate_at(session.session_id, at).await.unwrap();
    assert!(result.expired && !result.active);
    assert!(result.token.is_none());

    let err = fx
      .engine
      .check_in_at(attempt(&session, "u1", &token), at)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::SessionEnded));
  }

  let stored = fx.engine.store().get_session(session.session_id).await.unwrap().unwrap();
  assert!(!stored.is_active);
  assert_eq!(fx.engine.store().count_attendance(session.session_id).await.unwrap(), 0);
}

// ─── Check-in gates ──────────────────────────────────────────────────────────

#[tokio::test]
async fn rotated_token_honoured_through_grace_window() {
  let fx = fixture().await;
  let session = fx.session(|_| {}).await;

  let old = fx.token(&session, t0()).await;
  let _new = fx.token(&session, secs(15)).await;

  // Issued at t0 with a 15 s interval and 15 s grace.
  fx.engine
    .check_in_at(attempt(&session, "u1", &old), secs(30))
    .await
    .unwrap();
  let err = fx
    .engine
    .check_in_at(attempt(&session, "u2", &old), secs(31))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::TokenStale));
}

#[tokio::test]
async fn fast_rotation_keeps_every_token_until_its_own_expiry() {
  let fx = fixture().await;
  let session = fx.session(|i| i.rotation_interval_seconds = Some(5)).await;

  // Three rotations inside the first token's 5 s + 15 s window.
  let oldest = fx.token(&session, t0()).await;
  let middle = fx.token(&session, secs(5)).await;
  let current = fx.token(&session, secs(10)).await;

  fx.engine
    .check_in_at(attempt(&session, "u1", &oldest), secs(12))
    .await
    .unwrap();
  fx.engine
    .check_in_at(attempt(&session, "u2", &middle), secs(25))
    .await
    .unwrap();

  let err = fx
    .engine
    .check_in_at(attempt(&session, "u3", &oldest), secs(21))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::TokenStale));

  let err = fx
    .engine
    .check_in_at(attempt(&session, "u3", "forged"), secs(11))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::TokenStale));

  fx.engine
    .check_in_at(attempt(&session, "u3", &current), secs(30))
    .await
    .unwrap();
}

#[tokio::test]
async fn token_from_another_session_is_stale() {
  let fx = fixture().await;
  let ours = fx.session(|_| {}).await;
  let theirs = fx.session(|_| {}).await;
  fx.token(&ours, t0()).await;
  let foreign = fx.token(&theirs, t0()).await;

  let err = fx
    .engine
    .check_in_at(attempt(&ours, "u1", &foreign), secs(1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::TokenStale));
}

#[tokio::test]
async fn missing_fields_and_unknown_sessions() {
  let fx = fixture().await;
  let session = fx.session(|_| {}).await;
  let token = fx.token(&session, t0()).await;

  let err = fx
    .engine
    .check_in_at(attempt(&session, "  ", &token), secs(1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidRequest(_)));

  let mut bogus = attempt(&session, "u1", &token);
  bogus.session_id = "not-a-session".into();
  let err = fx.engine.check_in_at(bogus, secs(1)).await.unwrap_err();
  assert!(matches!(err, Error::SessionNotFound(_)));

  let mut unknown = attempt(&session, "u1", &token);
  unknown.session_id = Uuid::new_v4().to_string();
  let err = fx.engine.check_in_at(unknown, secs(1)).await.unwrap_err();
  assert!(matches!(err, Error::SessionNotFound(_)));
}

#[tokio::test]
async fn off_roster_student_rejected() {
  let fx = fixture().await;
  let session = fx.session(|_| {}).await;
  let token = fx.token(&session, t0()).await;

  let err = fx
    .engine
    .check_in_at(attempt(&session, "u99", &token), secs(1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotOnRoster));
}

#[tokio::test]
async fn stale_token_checked_before_roster_and_location() {
  let fx = fixture().await;
  let session = fx.session(geofenced).await;
  fx.token(&session, t0()).await;

  // Off roster, no location and a bad token: the token gate decides.
  let err = fx
    .engine
    .check_in_at(attempt(&session, "u99", "bad"), secs(1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::TokenStale));
  assert!(fx.engine.violations(session.session_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn geofenced_session_requires_location() {
  let fx = fixture().await;
  let session = fx.session(geofenced).await;
  let token = fx.token(&session, t0()).await;

  let err = fx
    .engine
    .check_in_at(attempt(&session, "u1", &token), secs(1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::LocationRequired));

  let mut garbage = attempt(&session, "u1", &token);
  garbage.location = Some(Coordinates::new(f64::NAN, 31.0));
  let err = fx.engine.check_in_at(garbage, secs(1)).await.unwrap_err();
  assert!(matches!(err, Error::LocationRequired));

  assert!(fx.engine.violations(session.session_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn geofence_boundary() {
  let fx = fixture().await;
  let session = fx.session(geofenced).await;
  let token = fx.token(&session, t0()).await;

  let mut at_edge = attempt(&session, "u1", &token);
  at_edge.location = Some(north_of(CAIRO, 100.0));
  fx.engine.check_in_at(at_edge, secs(1)).await.unwrap();

  let mut beyond = attempt(&session, "u2", &token);
  beyond.location = Some(north_of(CAIRO, 101.0));
  let err = fx.engine.check_in_at(beyond, secs(1)).await.unwrap_err();
  assert!(matches!(
    err,
    Error::OutOfRange { distance_meters: 101, radius_meters: 100 }
  ));
  assert!(err.is_recorded());

  let violations = fx.engine.violations(session.session_id).await.unwrap();
  assert_eq!(violations.len(), 1);
  assert_eq!(violations[0].university_id, "u2");
  assert_eq!(
    violations[0].details,
    ViolationDetails::OutOfRange { distance_meters: 101, radius_meters: 100 }
  );
}

#[tokio::test]
async fn fractional_overshoot_is_out_of_range() {
  let fx = fixture().await;
  let session = fx.session(geofenced).await;
  let token = fx.token(&session, t0()).await;

  // Rounds to the radius but still lies outside it.
  let mut just_beyond = attempt(&session, "u1", &token);
  just_beyond.location = Some(north_of(CAIRO, 100.4));
  let err = fx.engine.check_in_at(just_beyond, secs(1)).await.unwrap_err();
  assert!(matches!(
    err,
    Error::OutOfRange { distance_meters: 100, radius_meters: 100 }
  ));
  assert_eq!(fx.engine.violations(session.session_id).await.unwrap().len(), 1);
  assert_eq!(fx.engine.store().count_attendance(session.session_id).await.unwrap(), 0);
}

#[tokio::test]
async fn geofenced_lecture_end_to_end() {
  let fx = fixture().await;
  let session = fx.session(geofenced).await;
  let token = fx.token(&session, t0()).await;

  let mut far = attempt(&session, "u1", &token);
  far.location = Some(north_of(CAIRO, 150.0));
  let err = fx.engine.check_in_at(far, secs(3)).await.unwrap_err();
  assert!(matches!(err, Error::OutOfRange { distance_meters: 150, .. }));

  let mut near = attempt(&session, "u1", &token);
  near.location = Some(north_of(CAIRO, 50.0));
  let done = fx.engine.check_in_at(near, secs(6)).await.unwrap();
  assert_eq!(done.student_name, "Ada");
  assert_eq!(done.message, "Attendance recorded successfully!");
  assert_eq!(done.record.scanned_at, secs(6));

  let polled = fx.engine.rotate_at(session.session_id, secs(15)).await.unwrap();
  assert_eq!(polled.attendance_count, 1);
  assert_eq!(polled.total_students, 3);

  let violations = fx.engine.violations(session.session_id).await.unwrap();
  assert_eq!(violations.len(), 1);
  let records = fx.engine.attendance(session.session_id).await.unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].university_id, "u1");
}

#[tokio::test]
async fn shared_device_blocks_second_student_only() {
  let fx = fixture().await;
  let session = fx.session(|_| {}).await;
  let token = fx.token(&session, t0()).await;
  let with_fp = |uni: &str| CheckIn {
    fingerprint: Some("device-F".into()),
    ..attempt(&session, uni, &token)
  };

  fx.engine.check_in_at(with_fp("u1"), secs(1)).await.unwrap();

  let err = fx.engine.check_in_at(with_fp("u2"), secs(2)).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateDevice));

  // The original owner retrying is a duplicate, not a collision.
  let err = fx.engine.check_in_at(with_fp("u1"), secs(3)).await.unwrap_err();
  assert!(matches!(err, Error::AlreadyCheckedIn));

  let violations = fx.engine.violations(session.session_id).await.unwrap();
  assert_eq!(violations.len(), 1);
  assert_eq!(violations[0].university_id, "u2");
  assert_eq!(violations[0].student_name, "Bob");
  assert_eq!(
    violations[0].details,
    ViolationDetails::DuplicateDevice {
      fingerprint:          "device-F".into(),
      original_student_id:  "u1".into(),
      attempted_student_id: "u2".into(),
    }
  );
  assert_eq!(fx.engine.store().count_attendance(session.session_id).await.unwrap(), 1);
}

#[tokio::test]
async fn absent_fingerprint_skips_device_check() {
  let fx = fixture().await;
  let session = fx.session(|_| {}).await;
  let token = fx.token(&session, t0()).await;

  fx.engine
    .check_in_at(attempt(&session, "u1", &token), secs(1))
    .await
    .unwrap();
  let mut blank = attempt(&session, "u2", &token);
  blank.fingerprint = Some("   ".into());
  fx.engine.check_in_at(blank, secs(2)).await.unwrap();
  let mut fresh = attempt(&session, "u3", &token);
  fresh.fingerprint = Some("device-F".into());
  fx.engine.check_in_at(fresh, secs(3)).await.unwrap();

  assert!(fx.engine.violations(session.session_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_check_ins_record_once() {
  let fx = fixture().await;
  let session = fx.session(|_| {}).await;
  let token = fx.token(&session, t0()).await;
  let engine = Arc::new(fx.engine);

  let handles: Vec<_> = (0..8)
    .map(|_| {
      let engine = Arc::clone(&engine);
      let input = attempt(&session, "u1", &token);
      tokio::spawn(async move { engine.check_in_at(input, secs(2)).await })
    })
    .collect();

  let mut accepted = 0;
  for handle in handles {
    match handle.await.unwrap() {
      Ok(_) => accepted += 1,
      Err(Error::AlreadyCheckedIn) => {}
      Err(other) => panic!("unexpected rejection: {other:?}"),
    }
  }
  assert_eq!(accepted, 1);
  assert_eq!(engine.store().count_attendance(session.session_id).await.unwrap(), 1);
}

#[tokio::test]
async fn violation_write_failure_still_rejects() {
  let fx = fixture().await;
  let session = fx.session(geofenced).await;
  let token = fx.token(&session, t0()).await;

  fx.engine
    .store()
    .conn
    .call(|conn| {
      conn.execute_batch("DROP TABLE violations")?;
      Ok(())
    })
    .await
    .unwrap();

  let mut far = attempt(&session, "u1", &token);
  far.location = Some(north_of(CAIRO, 500.0));
  let err = fx.engine.check_in_at(far, secs(1)).await.unwrap_err();
  assert!(matches!(err, Error::OutOfRange { .. }));
}

#[tokio::test]
async fn commit_failure_leaves_no_trace() {
  let fx = fixture().await;
  let session = fx.session(|_| {}).await;
  let token = fx.token(&session, t0()).await;

  fx.engine
    .store()
    .conn
    .call(|conn| {
      conn.execute_batch(
        "CREATE TRIGGER refuse_attendance BEFORE INSERT ON attendance_records
         BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let with_fp = CheckIn {
    fingerprint: Some("device-F".into()),
    ..attempt(&session, "u1", &token)
  };
  let err = fx.engine.check_in_at(with_fp, secs(1)).await.unwrap_err();
  assert!(matches!(err, Error::Storage(_)), "got {err:?}");
  assert_eq!(err.kind(), ErrorKind::StorageFailure);

  assert_eq!(fx.engine.store().count_attendance(session.session_id).await.unwrap(), 0);
  assert!(fx.engine.violations(session.session_id).await.unwrap().is_empty());
}
