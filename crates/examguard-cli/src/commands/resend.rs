//! The `examguard resend` command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use comfy_table::{Cell, Table};

use examguard_core::result::ExamResult;
use examguard_core::store::FileStore;
use examguard_core::submission::{pending_key, SubmissionPipeline};
use examguard_core::traits::KeyValueStore;
use examguard_sinks::config::{create_sink, load_config_from};

pub async fn execute(
    list_only: bool,
    file: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = Arc::new(FileStore::open(&config.storage.dir)?);
    let sink = create_sink(config.sink.as_ref())?;
    let pipeline = SubmissionPipeline::new(sink, store.clone(), config.pipeline_config());

    if let Some(path) = file {
        return resend_file(&pipeline, store.as_ref(), &path).await;
    }

    let pending = pipeline.pending_results()?;
    if pending.is_empty() {
        println!("No pending results.");
        return Ok(());
    }

    if list_only {
        let mut table = Table::new();
        table.set_header(vec![
            "Submission",
            "Student",
            "Exam",
            "Type",
            "Forced",
            "Submitted at",
        ]);
        for result in &pending {
            table.add_row(vec![
                Cell::new(result.submission_id),
                Cell::new(&result.student.name),
                Cell::new(&result.exam.id),
                Cell::new(result.submission.kind),
                Cell::new(if result.submission.kind.is_forced() { "yes" } else { "no" }),
                Cell::new(result.timing.submitted_at.to_rfc3339()),
            ]);
        }
        println!("{table}");
        println!("{} pending result(s).", pending.len());
        return Ok(());
    }

    anyhow::ensure!(
        pipeline.has_sink(),
        "no submission sink configured; set [sink] in examguard.toml or EXAMGUARD_WEBHOOK_URL"
    );

    eprintln!("Resending {} pending result(s)...", pending.len());
    let outcomes = pipeline.resend_pending().await?;

    let mut table = Table::new();
    table.set_header(vec!["Submission", "Status", "Error"]);
    let mut failed = 0;
    for outcome in &outcomes {
        if !outcome.success {
            failed += 1;
        }
        table.add_row(vec![
            Cell::new(outcome.submission_id),
            Cell::new(if outcome.success { "delivered" } else { "failed" }),
            Cell::new(outcome.error.as_deref().unwrap_or("")),
        ]);
    }
    println!("{table}");

    anyhow::ensure!(failed == 0, "{failed} result(s) could not be delivered");
    println!("All pending results delivered.");
    Ok(())
}

/// Deliver a result document saved by `replay --output`.
async fn resend_file(pipeline: &SubmissionPipeline, store: &FileStore, path: &Path) -> Result<()> {
    let result = ExamResult::load_json(path)?;
    anyhow::ensure!(
        pipeline.has_sink(),
        "no submission sink configured; set [sink] in examguard.toml or EXAMGUARD_WEBHOOK_URL"
    );

    let outcome = pipeline.finalize(&result).await;
    anyhow::ensure!(
        outcome.success,
        "{} could not be delivered: {}",
        outcome.submission_id,
        outcome.error.as_deref().unwrap_or("unknown error")
    );
    store.delete(&pending_key(outcome.submission_id))?;
    println!(
        "Delivered {} ({}, {}).",
        outcome.submission_id, result.student.name, result.submission.kind
    );
    Ok(())
}
