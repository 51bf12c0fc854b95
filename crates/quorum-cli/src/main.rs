//! `quorum`: command-line client for the Quorum check-in server.
//!
//! # Usage
//!
//! ```text
//! quorum start <GROUP_ID> --minutes 90 --lat 30.0444 --lon 31.2357
//! quorum display <SESSION_ID>
//! quorum check-in <SESSION_ID> <UNIVERSITY_ID> --token <TOKEN>
//! quorum --config ~/.config/quorum/config.toml end <SESSION_ID>
//! ```

mod client;
mod display;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{ApiClient, AttendOutcome, AttendRequest, CreateSessionBody};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_URL: &str = "http://localhost:8080";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "quorum", about = "Client for the Quorum attendance server")]
struct Args {
  /// Path to a TOML config file (url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the quorum server (default: http://localhost:8080).
  #[arg(long, env = "QUORUM_URL")]
  url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Start a new session for a group.
  Start {
    group_id: Uuid,
    #[arg(long, default_value_t = 60)]
    minutes:  u32,
    #[arg(long)]
    title:    Option<String>,
    /// Geofence center latitude; requires --lon.
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat:      Option<f64>,
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon:      Option<f64>,
    #[arg(long)]
    radius:   Option<u32>,
    /// Keep one token for the whole session instead of rotating it.
    #[arg(long)]
    static_code: bool,
    #[arg(long)]
    interval: Option<u32>,
  },
  /// List a group's sessions, newest first.
  Sessions { group_id: Uuid },
  /// Keep printing the current check-in link until the session ends.
  Display {
    session_id: Uuid,
    /// Seconds between polls (default: the session's rotation interval).
    #[arg(long)]
    every:      Option<u64>,
  },
  /// Show whether a session needs a location to check in.
  Info { session_id: Uuid },
  /// End a session now.
  End { session_id: Uuid },
  /// Print a session's violation log.
  Violations { session_id: Uuid },
  /// Check a student in.
  CheckIn {
    session_id:    Uuid,
    university_id: String,
    #[arg(long)]
    token:         String,
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat:           Option<f64>,
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon:           Option<f64>,
    #[arg(long)]
    fingerprint:   Option<String>,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default, Debug, PartialEq)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

impl ConfigFile {
  fn read(path: Option<&PathBuf>) -> Result<Self> {
    let Some(path) = path else {
      return Ok(Self::default());
    };
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")
  }
}

/// CLI flag (or env) over config file over default.
fn resolve_url(flag: Option<String>, file: &ConfigFile) -> String {
  flag
    .or_else(|| (!file.url.is_empty()).then(|| file.url.clone()))
    .unwrap_or_else(|| DEFAULT_URL.to_string())
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let file_cfg = ConfigFile::read(args.config.as_ref())?;
  let base_url = resolve_url(args.url, &file_cfg);
  let client = ApiClient::new(base_url.clone())?;

  match args.command {
    Command::Start {
      group_id,
      minutes,
      title,
      lat,
      lon,
      radius,
      static_code,
      interval,
    } => {
      let session = client
        .create_session(&CreateSessionBody {
          group_id,
          title,
          duration_minutes: minutes,
          latitude: lat,
          longitude: lon,
          radius_meters: radius,
          qr_rotating: static_code.then_some(false),
          rotation_interval_seconds: interval,
        })
        .await?;
      println!("{}", session.session_id);
      eprintln!("expires at {}", session.expires_at);
    }

    Command::Sessions { group_id } => {
      for row in client.list_sessions(group_id).await? {
        let s = &row.session;
        println!(
          "{}  {:<8}  {:>4} present  {}  {}",
          s.session_id,
          if s.is_active { "active" } else { "ended" },
          row.attendance_count,
          s.started_at.format("%Y-%m-%d %H:%M"),
          s.title.as_deref().unwrap_or("")
        );
      }
    }

    Command::Display { session_id, every } => {
      let every = every.map(|secs| Duration::from_secs(secs.max(1)));
      display::run(&client, session_id, every, &base_url).await?;
    }

    Command::Info { session_id } => {
      let info = client.info(session_id).await?;
      if info.has_location {
        println!("location required (within {} m)", info.radius_meters);
      } else {
        println!("no location required");
      }
    }

    Command::End { session_id } => {
      client.end(session_id).await?;
      println!("session {session_id} ended");
    }

    Command::Violations { session_id } => {
      for v in client.violations(session_id).await? {
        println!(
          "{}  {:<12} {:<24} {}",
          v.created_at.format("%H:%M:%S"),
          v.university_id,
          v.student_name,
          v.details.discriminant()
        );
      }
    }

    Command::CheckIn {
      session_id,
      university_id,
      token,
      lat,
      lon,
      fingerprint,
    } => {
      let outcome = client
        .attend(&AttendRequest {
          session_id,
          university_id,
          token,
          latitude: lat,
          longitude: lon,
          fingerprint,
        })
        .await?;
      match outcome {
        AttendOutcome::Recorded { student_name, message } => {
          println!("{message} Welcome, {student_name}.");
        }
        AttendOutcome::AlreadyCheckedIn(message) => println!("{message}"),
      }
    }
  }

  Ok(())
}
