//! HTTP server assembly for Quorum: configuration and the top-level router.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use quorum_core::{Engine, config::EngineConfig, store::AttendanceStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `QUORUM_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  /// SQLite database file. A leading `~/` is expanded.
  pub store_path: PathBuf,
  /// Public origin embedded in check-in links, e.g. `https://quorum.example`.
  pub base_url:   Option<String>,
  pub engine:     EngineConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_string(),
      port:       8080,
      store_path: PathBuf::from("quorum.db"),
      base_url:   None,
      engine:     EngineConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Read `path` (optional) overlaid by the environment. Nested keys use a
  /// double underscore, e.g. `QUORUM_ENGINE__TOKEN_GRACE_SECONDS`.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("QUORUM")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The complete application: the JSON API wrapped in request tracing.
pub fn app<S>(engine: Arc<Engine<S>>, config: &ServerConfig) -> Router
where
  S: AttendanceStore + 'static,
{
  quorum_api::api_router(engine, config.base_url.clone())
    .layer(TraceLayer::new_for_http())
}
