//! Roster entries. The roster itself is managed elsewhere; the engine only
//! reads it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub student_id:    Uuid,
  pub group_id:      Uuid,
  /// Unique within the group.
  pub university_id: String,
  pub name:          String,
}
