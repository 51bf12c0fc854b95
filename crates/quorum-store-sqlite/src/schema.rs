//! SQL schema for the Quorum SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Roster entries. Written by roster management, only read by the engine.
CREATE TABLE IF NOT EXISTS students (
    student_id    TEXT PRIMARY KEY,
    group_id      TEXT NOT NULL,
    university_id TEXT NOT NULL,
    name          TEXT NOT NULL,
    UNIQUE (group_id, university_id)
);

-- Only is_active and the current-token columns are ever updated.
CREATE TABLE IF NOT EXISTS sessions (
    session_id                TEXT PRIMARY KEY,
    group_id                  TEXT NOT NULL,
    title                     TEXT,
    duration_minutes          INTEGER NOT NULL CHECK (duration_minutes > 0),
    is_active                 INTEGER NOT NULL DEFAULT 1,
    started_at                TEXT NOT NULL,   -- ISO 8601 UTC
    expires_at                TEXT NOT NULL,   -- fixed at creation
    current_token             TEXT,
    token_expires_at          TEXT,
    latitude                  REAL,
    longitude                 REAL,
    radius_meters             INTEGER,
    qr_rotating               INTEGER NOT NULL DEFAULT 1,
    rotation_interval_seconds INTEGER NOT NULL,
    CHECK ((latitude IS NULL) = (longitude IS NULL))
);

-- Every token issued for a session, each with its own expiry. A row is
-- only ever inserted or has its expiry moved.
CREATE TABLE IF NOT EXISTS session_tokens (
    session_id TEXT NOT NULL REFERENCES sessions(session_id),
    token      TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    PRIMARY KEY (session_id, token)
);

-- Append-only. The UNIQUE constraint is the final authority on
-- at-most-once attendance per (session, student).
CREATE TABLE IF NOT EXISTS attendance_records (
    record_id     TEXT PRIMARY KEY,
    session_id    TEXT NOT NULL REFERENCES sessions(session_id),
    student_id    TEXT NOT NULL REFERENCES students(student_id),
    university_id TEXT NOT NULL,
    scanned_at    TEXT NOT NULL,
    fingerprint   TEXT,
    UNIQUE (session_id, student_id)
);

-- Append-only audit log. No UPDATE or DELETE is ever issued against it.
CREATE TABLE IF NOT EXISTS violations (
    violation_id  TEXT PRIMARY KEY,
    session_id    TEXT NOT NULL REFERENCES sessions(session_id),
    university_id TEXT NOT NULL,
    student_name  TEXT NOT NULL,
    type          TEXT NOT NULL,   -- 'out_of_range' | 'duplicate_device'
    details_json  TEXT NOT NULL,   -- JSON payload (inner details only)
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS sessions_group_idx      ON sessions(group_id, started_at);
CREATE INDEX IF NOT EXISTS attendance_session_idx  ON attendance_records(session_id, scanned_at);
CREATE INDEX IF NOT EXISTS attendance_device_idx   ON attendance_records(session_id, fingerprint);
CREATE INDEX IF NOT EXISTS violations_session_idx  ON violations(session_id, created_at);

PRAGMA user_version = 1;
";
