//! The result document handed to downstream grading tooling.
//!
//! Field names are part of the external contract and serialize in camelCase.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{ExamDefinition, StudentInfo};
use crate::monitor::{ViolationRecord, ViolationReport};
use crate::scoring::{AnswerOutcome, ScoreCard, ScoringSummary};

/// What triggered a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionType {
    Manual,
    AutoTimeout,
    AutoViolation,
}

impl SubmissionType {
    /// Forced submissions are not initiated by the student.
    pub fn is_forced(&self) -> bool {
        !matches!(self, SubmissionType::Manual)
    }
}

impl std::fmt::Display for SubmissionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionType::Manual => write!(f, "manual"),
            SubmissionType::AutoTimeout => write!(f, "auto-timeout"),
            SubmissionType::AutoViolation => write!(f, "auto-violation"),
        }
    }
}

/// The subset of the exam the result refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamReference {
    pub id: String,
    pub title: String,
    pub subject: String,
}

impl From<&ExamDefinition> for ExamReference {
    fn from(exam: &ExamDefinition) -> Self {
        Self {
            id: exam.id.clone(),
            title: exam.metadata.title.clone(),
            subject: exam.metadata.subject.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultTiming {
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub duration_allowed_minutes: u32,
    pub time_taken_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionInfo {
    #[serde(rename = "type")]
    pub kind: SubmissionType,
    pub client_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegritySnapshot {
    pub violations: u32,
    pub ledger: Vec<ViolationRecord>,
}

impl From<ViolationReport> for IntegritySnapshot {
    fn from(report: ViolationReport) -> Self {
        Self {
            violations: report.count,
            ledger: report.ledger,
        }
    }
}

/// A finished exam attempt. Built once at submission and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub submission_id: Uuid,
    pub student: StudentInfo,
    pub exam: ExamReference,
    pub answers: Vec<AnswerOutcome>,
    pub score: ScoringSummary,
    pub timing: ResultTiming,
    pub submission: SubmissionInfo,
    pub integrity: IntegritySnapshot,
}

impl ExamResult {
    /// Assemble a result from a score card and the frozen violation ledger.
    pub fn new(
        student: StudentInfo,
        exam: &ExamDefinition,
        card: ScoreCard,
        timing: ResultTiming,
        kind: SubmissionType,
        violations: ViolationReport,
    ) -> Self {
        Self {
            submission_id: Uuid::new_v4(),
            student,
            exam: ExamReference::from(exam),
            answers: card.outcomes,
            score: card.summary,
            timing,
            submission: SubmissionInfo {
                kind,
                client_timestamp: Utc::now(),
            },
            integrity: violations.into(),
        }
    }

    /// Save the result as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize result")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write result to {}", path.display()))?;
        Ok(())
    }

    /// Load a result from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read result from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse result JSON")
    }
}
