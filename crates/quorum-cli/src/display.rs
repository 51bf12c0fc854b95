//! The classroom display loop: poll for a fresh token at the session's
//! rotation interval and print the current check-in link until the session
//! is over.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use quorum_core::issuer::check_in_link;
use uuid::Uuid;

use crate::client::{ApiClient, TokenResponse};

/// What one poll asks the display to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
  Show { link: String, status: String },
  Finished { status: String },
}

/// Render a poll result. `fallback_base` builds the link when the server
/// was not configured with a public base URL.
pub fn frame(
  session_id: Uuid,
  resp: &TokenResponse,
  fallback_base: &str,
  now: DateTime<Utc>,
) -> Frame {
  let r = &resp.result;
  let present = format!("{} / {} present", r.attendance_count, r.total_students);

  match (&r.token, r.expired) {
    (Some(token), false) => {
      let link = resp
        .check_in_url
        .clone()
        .unwrap_or_else(|| check_in_link(fallback_base, session_id, token));
      let left = (r.expires_at - now).num_seconds().max(0);
      Frame::Show {
        link,
        status: format!("{present} · {}:{:02} left", left / 60, left % 60),
      }
    }
    _ => Frame::Finished {
      status: format!("Session has ended · {present}"),
    },
  }
}

/// Used between polls until the server has reported the session's interval.
const FALLBACK_POLL: Duration = Duration::from_secs(15);

/// The pause before the next poll. An explicit `every` wins; otherwise the
/// display follows the interval the server reported for the session.
pub fn poll_delay(every: Option<Duration>, reported_interval_seconds: u32) -> Duration {
  every.unwrap_or_else(|| Duration::from_secs(u64::from(reported_interval_seconds.max(1))))
}

/// Poll until the session ends or Ctrl-C. A failed poll is logged and
/// retried after the last known delay.
pub async fn run(
  client: &ApiClient,
  session_id: Uuid,
  every: Option<Duration>,
  fallback_base: &str,
) -> Result<()> {
  let mut delay = every.unwrap_or(FALLBACK_POLL);
  loop {
    match client.rotate(session_id).await {
      Ok(resp) => {
        delay = poll_delay(every, resp.result.rotation_interval_seconds);
        match frame(session_id, &resp, fallback_base, Utc::now()) {
          Frame::Show { link, status } => {
            println!("{link}");
            println!("  {status}");
          }
          Frame::Finished { status } => {
            println!("{status}");
            return Ok(());
          }
        }
      }
      Err(e) => tracing::warn!(error = %e, "token poll failed; retrying"),
    }

    tokio::select! {
      _ = tokio::time::sleep(delay) => {}
      _ = tokio::signal::ctrl_c() => {
        println!();
        return Ok(());
      }
    }
  }
}
