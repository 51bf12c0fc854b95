//! Tunables for the check-in engine.

use chrono::Duration;
use serde::Deserialize;

/// Tokens never carry fewer random bytes than this.
pub const MIN_TOKEN_BYTES: usize = 16;

/// Engine configuration. Every field has a default, so an empty config
/// section deserialises to [`EngineConfig::default`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Extra lifetime granted to a rotated token beyond its rotation interval,
  /// so a student mid-scan during rotation is not rejected.
  pub token_grace_seconds:               u32,
  /// Lifetime granted to the token of a non-rotating session on each poll.
  pub static_token_ttl_seconds:          u32,
  /// Geofence radius used when a session has a center but no radius.
  pub default_radius_meters:             u32,
  /// Rotation interval for sessions created without one.
  pub default_rotation_interval_seconds: u32,
  /// Random bytes per token, clamped to at least [`MIN_TOKEN_BYTES`].
  pub token_bytes:                       usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      token_grace_seconds:               15,
      static_token_ttl_seconds:          3600,
      default_radius_meters:             100,
      default_rotation_interval_seconds: 15,
      token_bytes:                       MIN_TOKEN_BYTES,
    }
  }
}

impl EngineConfig {
  pub fn token_grace(&self) -> Duration {
    Duration::seconds(i64::from(self.token_grace_seconds))
  }

  pub fn static_token_ttl(&self) -> Duration {
    Duration::seconds(i64::from(self.static_token_ttl_seconds))
  }

  pub fn token_bytes(&self) -> usize { self.token_bytes.max(MIN_TOKEN_BYTES) }
}
