//! Error types for `quorum-core`.
//!
//! Every variant's `Display` output is the human-readable reason shown to the
//! person who triggered it. [`ErrorKind`] is the stable, machine-readable
//! classification.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  InvalidRequest(String),

  #[error("Session not found")]
  SessionNotFound(Uuid),

  #[error("This session has ended")]
  SessionEnded,

  #[error("This session has expired")]
  SessionExpired,

  #[error(
    "QR code has expired. Please scan the current QR code on the screen."
  )]
  TokenStale,

  #[error(
    "Student ID not found in this class. Please check your ID and try again."
  )]
  NotOnRoster,

  #[error(
    "Location access is required to check in to this session. Please allow \
     location access and try again."
  )]
  LocationRequired,

  #[error(
    "You are outside the allowed area for this session ({distance_meters} m \
     away, limit {radius_meters} m). Your attempt has been recorded."
  )]
  OutOfRange {
    distance_meters: u64,
    radius_meters:   u32,
  },

  #[error(
    "This device has already been used to check in another student. Your \
     attempt has been recorded."
  )]
  DuplicateDevice,

  #[error("You have already checked in for this session.")]
  AlreadyCheckedIn,

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Box a store backend error.
  pub fn storage<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(err))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
      Self::SessionNotFound(_) => ErrorKind::NotFound,
      Self::SessionEnded => ErrorKind::SessionEnded,
      Self::SessionExpired => ErrorKind::SessionExpired,
      Self::TokenStale => ErrorKind::TokenStale,
      Self::NotOnRoster => ErrorKind::NotOnRoster,
      Self::LocationRequired => ErrorKind::LocationRequired,
      Self::OutOfRange { .. } => ErrorKind::OutOfRange,
      Self::DuplicateDevice => ErrorKind::DuplicateDevice,
      Self::AlreadyCheckedIn => ErrorKind::AlreadyCheckedIn,
      Self::Storage(_) | Self::Serialization(_) => ErrorKind::StorageFailure,
    }
  }

  /// Whether this rejection was paired with a persisted violation record.
  pub fn is_recorded(&self) -> bool {
    matches!(self, Self::OutOfRange { .. } | Self::DuplicateDevice)
  }
}

/// Classification of an [`Error`], independent of any transport.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
  NotFound,
  InvalidRequest,
  SessionEnded,
  SessionExpired,
  TokenStale,
  NotOnRoster,
  LocationRequired,
  OutOfRange,
  DuplicateDevice,
  /// Not a true failure; clients render a neutral "already in" state.
  AlreadyCheckedIn,
  StorageFailure,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
