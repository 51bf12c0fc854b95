//! Core types, the store trait, and the check-in verification engine for
//! Quorum.
//!
//! This crate has no HTTP or database dependencies. All other crates depend
//! on it.

pub mod attendance;
pub mod checkin;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod issuer;
mod recorder;
pub mod roster;
pub mod session;
pub mod store;
pub mod violation;

pub use engine::Engine;
pub use error::{Error, ErrorKind, Result};
