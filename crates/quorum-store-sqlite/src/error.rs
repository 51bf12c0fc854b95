//! Error type for `quorum-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] quorum_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("student {university_id:?} already exists in group {group_id}")]
  DuplicateStudent {
    group_id:      uuid::Uuid,
    university_id: String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
