//! Best-effort violation recording.

use crate::{engine::Engine, store::AttendanceStore, violation::NewViolation};

impl<S: AttendanceStore> Engine<S> {
  /// Append a violation to the audit log.
  ///
  /// A failed write is reported to operators and swallowed: the caller still
  /// returns its rejection to the student unchanged.
  pub(crate) async fn record_violation(&self, input: NewViolation) {
    let kind = input.details.discriminant();
    let session_id = input.session_id;
    let university_id = input.university_id.clone();

    match self.store().record_violation(input).await {
      Ok(v) => {
        tracing::warn!(
          %session_id,
          %university_id,
          kind,
          violation_id = %v.violation_id,
          "check-in violation recorded"
        );
      }
      Err(e) => {
        tracing::error!(
          %session_id,
          %university_id,
          kind,
          error = %e,
          "failed to record check-in violation"
        );
      }
    }
  }
}
