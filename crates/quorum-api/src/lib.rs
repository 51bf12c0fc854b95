//! JSON REST API for Quorum.
//!
//! Exposes an axum [`Router`] over an [`Engine`] backed by any
//! [`AttendanceStore`]. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(quorum_api::api_router(engine.clone(), Some(base_url)))
//! ```

pub mod attend;
pub mod error;
pub mod sessions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use quorum_core::{Engine, store::AttendanceStore};

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub engine:   Arc<Engine<S>>,
  /// Public origin used to build check-in links; links are omitted if unset.
  pub base_url: Option<String>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      engine:   Arc::clone(&self.engine),
      base_url: self.base_url.clone(),
    }
  }
}

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(engine: Arc<Engine<S>>, base_url: Option<String>) -> Router<()>
where
  S: AttendanceStore + 'static,
{
  Router::new()
    // Instructor
    .route("/sessions", post(sessions::create::<S>))
    .route("/groups/{group_id}/sessions", get(sessions::list::<S>))
    .route("/sessions/{id}/end", post(sessions::end::<S>))
    .route("/sessions/{id}/attendance", get(sessions::attendance::<S>))
    .route("/sessions/{id}/violations", get(sessions::violations::<S>))
    // Display
    .route("/sessions/{id}/token", post(sessions::token::<S>))
    // Student
    .route("/sessions/{id}/info", get(sessions::info::<S>))
    .route("/attend", post(attend::handler::<S>))
    .with_state(ApiState { engine, base_url })
}
