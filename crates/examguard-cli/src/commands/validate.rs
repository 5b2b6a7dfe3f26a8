//! The `examguard validate` command.

use std::path::PathBuf;

use anyhow::Result;

use examguard_core::parser;

pub fn execute(exam_path: PathBuf) -> Result<()> {
    let exams = if exam_path.is_dir() {
        parser::load_exam_directory(&exam_path)?
    } else {
        vec![parser::load_exam(&exam_path)?]
    };
    anyhow::ensure!(!exams.is_empty(), "no exams found in {}", exam_path.display());

    let mut total_warnings = 0;

    for exam in &exams {
        let title = if exam.metadata.title.is_empty() {
            exam.id.as_str()
        } else {
            exam.metadata.title.as_str()
        };
        println!("Exam: {title} ({} questions)", exam.questions.len());

        let warnings = parser::validate_exam(exam);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All exams valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
