//! Core data model types for examguard.
//!
//! Exam definitions arrive already parsed from an external authoring tool and
//! stay read-only for the whole session.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Answers keyed by question id. A missing entry means unanswered.
pub type Answers = BTreeMap<String, OptionKey>;

/// One of the four answer letters of a multiple-choice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionKey {
    A,
    B,
    C,
    D,
}

impl OptionKey {
    pub const ALL: [OptionKey; 4] = [OptionKey::A, OptionKey::B, OptionKey::C, OptionKey::D];
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            OptionKey::A => "A",
            OptionKey::B => "B",
            OptionKey::C => "C",
            OptionKey::D => "D",
        };
        f.write_str(letter)
    }
}

impl FromStr for OptionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(OptionKey::A),
            "B" => Ok(OptionKey::B),
            "C" => Ok(OptionKey::C),
            "D" => Ok(OptionKey::D),
            other => Err(format!("unknown option: {other}")),
        }
    }
}

/// A single multiple-choice question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Unique identifier within the exam.
    pub id: String,
    /// Display number.
    #[serde(default)]
    pub number: u32,
    /// Question text.
    pub text: String,
    /// Option letter → option text.
    #[serde(default)]
    pub options: BTreeMap<OptionKey, String>,
    /// The letter that scores.
    pub correct_option: OptionKey,
    /// Marks for a correct answer. Unset or non-positive counts as 1.
    #[serde(default)]
    pub marks: Option<i64>,
}

impl Question {
    /// Marks this question is worth after applying the default.
    pub fn effective_marks(&self) -> u32 {
        match self.marks {
            Some(m) if m > 0 => u32::try_from(m).unwrap_or(u32::MAX),
            _ => 1,
        }
    }
}

/// Descriptive metadata carried through to the result document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExamMetadata {
    pub title: String,
    pub subject: String,
    pub description: String,
    pub instructions: String,
    pub author: String,
}

/// Per-exam timing, grading and proctoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSettings {
    /// Exam length. Sessions refuse to start without it.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    /// Declared total, informational only; scoring sums question marks.
    #[serde(default)]
    pub total_marks: Option<u32>,
    /// Pass threshold as a percentage.
    #[serde(default = "default_pass_mark")]
    pub pass_mark: f64,
    /// Recorded violations that end the exam.
    #[serde(default = "default_violation_threshold")]
    pub violation_threshold: u32,
    #[serde(default = "default_true")]
    pub auto_submit_on_violation: bool,
    /// Enter fullscreen at session start.
    #[serde(default)]
    pub strict_mode: bool,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub shuffle_options: bool,
}

impl Default for ExamSettings {
    fn default() -> Self {
        Self {
            duration_minutes: None,
            total_marks: None,
            pass_mark: default_pass_mark(),
            violation_threshold: default_violation_threshold(),
            auto_submit_on_violation: true,
            strict_mode: false,
            shuffle_questions: false,
            shuffle_options: false,
        }
    }
}

fn default_pass_mark() -> f64 {
    50.0
}

fn default_violation_threshold() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

/// A complete exam as produced by the authoring collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDefinition {
    pub id: String,
    #[serde(default)]
    pub metadata: ExamMetadata,
    #[serde(default)]
    pub settings: ExamSettings,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl ExamDefinition {
    /// Look up a question by id.
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// The student taking the exam.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub roll_number: String,
    #[serde(default)]
    pub email: Option<String>,
}
