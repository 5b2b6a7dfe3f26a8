//! Exam definition loading and validation.
//!
//! Exams are authored elsewhere and handed to examguard as JSON. This module
//! only reads them and points out problems that would skew scoring.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::ExamDefinition;

/// Parse a single JSON file into an `ExamDefinition`.
pub fn load_exam(path: &Path) -> Result<ExamDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read exam file: {}", path.display()))?;

    parse_exam_str(&content, path)
}

/// Parse a JSON string into an `ExamDefinition` (useful for testing).
pub fn parse_exam_str(content: &str, source_path: &Path) -> Result<ExamDefinition> {
    let exam: ExamDefinition = serde_json::from_str(content)
        .with_context(|| format!("failed to parse exam JSON: {}", source_path.display()))?;
    anyhow::ensure!(
        !exam.id.trim().is_empty(),
        "exam in {} has an empty id",
        source_path.display()
    );
    Ok(exam)
}

/// Load every `.json` exam in a directory, skipping files that fail to parse.
pub fn load_exam_directory(dir: &Path) -> Result<Vec<ExamDefinition>> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut exams = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            match load_exam(&path) {
                Ok(exam) => exams.push(exam),
                Err(e) => tracing::warn!("skipping {}: {e:#}", path.display()),
            }
        }
    }
    exams.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(exams)
}

/// A warning from exam validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate an exam for issues that affect sessions or scoring.
pub fn validate_exam(exam: &ExamDefinition) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if exam.settings.duration_minutes.unwrap_or(0) == 0 {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "settings.durationMinutes is missing; sessions cannot start".into(),
        });
    }

    if exam.settings.violation_threshold == 0 {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "settings.violationThreshold must be at least 1".into(),
        });
    }

    if exam.questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "exam has no questions".into(),
        });
    }

    let mut seen_ids = HashSet::new();
    for q in &exam.questions {
        if !seen_ids.insert(q.id.as_str()) {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: format!("duplicate question ID: {}", q.id),
            });
        }
        if !q.options.contains_key(&q.correct_option) {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: format!("correct option {} has no option text", q.correct_option),
            });
        }
        if q.marks.is_some_and(|m| m <= 0) {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: "marks must be positive; counting as 1".into(),
            });
        }
    }

    if let Some(declared) = exam.settings.total_marks {
        let actual: u64 = exam
            .questions
            .iter()
            .map(|q| u64::from(q.effective_marks()))
            .sum();
        if u64::from(declared) != actual {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!(
                    "settings.totalMarks is {declared} but questions add up to {actual}"
                ),
            });
        }
    }

    warnings
}
