//! Crash and reload recovery for exam sessions.
//!
//! A snapshot is the serialized session state. It is written often and read
//! at most once per page load; anything that does not look like a usable
//! session is treated as corrupted and discarded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::model::{Answers, ExamDefinition, StudentInfo};

/// Store key holding the single persisted snapshot.
pub const SNAPSHOT_KEY: &str = "examguard.session";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTiming {
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    pub duration_allowed_minutes: u32,
}

/// Serialized form of a running session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub student: StudentInfo,
    pub exam: ExamDefinition,
    #[serde(default)]
    pub current_index: usize,
    #[serde(default)]
    pub answers: Answers,
    pub time_left_seconds: u64,
    pub timing: SessionTiming,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a persisted snapshot, rejecting payloads without an exam id or
    /// a student name.
    pub fn restore(raw: &str) -> Result<Self, SnapshotError> {
        let snapshot: SessionSnapshot = serde_json::from_str(raw)?;
        if snapshot.exam.id.trim().is_empty() {
            return Err(SnapshotError::MissingExamId);
        }
        if snapshot.student.name.trim().is_empty() {
            return Err(SnapshotError::MissingStudentName);
        }
        Ok(snapshot)
    }
}
