//! The `examguard replay` command.
//!
//! Drives a real session from a script instead of a browser: the countdown
//! advances one tick per scripted second and signals carry their scripted
//! instants, so a replay is deterministic however fast it runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::time::Instant;

use examguard_core::model::{OptionKey, StudentInfo};
use examguard_core::monitor::MonitorPhase;
use examguard_core::parser;
use examguard_core::result::{ExamResult, SubmissionType};
use examguard_core::session::{SessionController, SessionDeps};
use examguard_core::store::FileStore;
use examguard_core::submission::SubmissionPipeline;
use examguard_core::traits::EnvironmentSignal;
use examguard_sinks::config::{create_sink, load_config_from};

/// A scripted exam attempt.
#[derive(Debug, Deserialize)]
pub struct SessionScript {
    pub student: StudentInfo,
    #[serde(default)]
    pub events: Vec<ScriptEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptEvent {
    /// Milliseconds since the session started.
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ScriptAction {
    Answer { question: String, option: OptionKey },
    Clear { question: String },
    Navigate { index: usize },
    Signal(EnvironmentSignal),
    Submit,
}

pub fn load_script(path: &Path) -> Result<SessionScript> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script: {}", path.display()))?;
    let mut script: SessionScript = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse script: {}", path.display()))?;
    script.events.sort_by_key(|e| e.at_ms);
    Ok(script)
}

pub async fn execute(
    exam_path: PathBuf,
    script_path: PathBuf,
    output: Option<PathBuf>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let exam = parser::load_exam(&exam_path)?;
    let script = load_script(&script_path)?;

    let store = Arc::new(FileStore::open(&config.storage.dir)?);
    let sink = create_sink(config.sink.as_ref())?;
    if sink.is_none() {
        eprintln!("No submission sink configured; the result stays in local storage.");
    }
    let pipeline = Arc::new(SubmissionPipeline::new(
        sink,
        store.clone(),
        config.pipeline_config(),
    ));
    let controller = SessionController::new(
        SessionDeps::new(store, pipeline),
        config.session_config(),
    );

    controller.start_session(exam, script.student).await?;
    let result = run_script(&controller, &script.events).await?;

    if let Some(path) = &output {
        result.save_json(path)?;
        eprintln!("Result saved to: {}", path.display());
    }

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_result(&controller, &result),
    }

    Ok(())
}

/// Play `events` against a started session until it is submitted, letting
/// the countdown expire when the script ends first.
pub async fn run_script(
    controller: &SessionController,
    events: &[ScriptEvent],
) -> Result<ExamResult> {
    let origin = Instant::now();
    let mut elapsed_secs = 0u64;

    for event in events {
        if controller.is_submitted() {
            tracing::debug!(at_ms = event.at_ms, "session over, remaining events skipped");
            break;
        }
        while elapsed_secs < event.at_ms / 1000 {
            if controller.tick().await.is_none() {
                break;
            }
            elapsed_secs += 1;
        }

        match &event.action {
            ScriptAction::Answer { question, option } => {
                controller.record_answer(question, *option);
            }
            ScriptAction::Clear { question } => {
                controller.clear_answer(question);
            }
            ScriptAction::Navigate { index } => {
                controller.navigate(*index);
            }
            ScriptAction::Signal(signal) => {
                let at = origin + Duration::from_millis(event.at_ms);
                controller.monitor().handle_signal_at(*signal, at);
                if controller.monitor().phase() == MonitorPhase::Submitting {
                    controller.wait_for_outcome().await;
                }
            }
            ScriptAction::Submit => {
                controller.submit(SubmissionType::Manual).await;
            }
        }
    }

    while controller.tick().await.is_some() {}

    // A violation submission runs on its own task.
    controller.wait_for_outcome().await;
    controller
        .result()
        .context("session ended without a result")
}

fn print_result(controller: &SessionController, result: &ExamResult) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    let rows = [
        ("Student", format!("{} ({})", result.student.name, result.student.roll_number)),
        ("Exam", result.exam.id.clone()),
        ("Submission", result.submission.kind.to_string()),
        (
            "Score",
            format!(
                "{}/{} ({:.2}%)",
                result.score.obtained_marks, result.score.total_marks, result.score.percentage
            ),
        ),
        ("Passed", result.score.passed.to_string()),
        ("Unanswered", result.score.unanswered.to_string()),
        ("Violations", result.integrity.violations.to_string()),
        ("Time taken", format!("{}s", result.timing.time_taken_seconds)),
    ];
    for (field, value) in rows {
        table.add_row(vec![Cell::new(field), Cell::new(value)]);
    }
    println!("{table}");

    for record in &result.integrity.ledger {
        println!("  violation: {} at {}", record.kind, record.timestamp.to_rfc3339());
    }

    match controller.outcome() {
        Some(outcome) if outcome.success => {
            println!("Delivered submission {}", outcome.submission_id)
        }
        Some(outcome) => println!(
            "Not delivered ({}); kept for `examguard resend`",
            outcome.error.unwrap_or_default()
        ),
        None => {}
    }
}
