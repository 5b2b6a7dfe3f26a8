//! The `examguard score` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use examguard_core::model::Answers;
use examguard_core::parser;
use examguard_core::scoring::{self, ScoreCard};

pub fn execute(exam_path: PathBuf, answers_path: PathBuf, format: String) -> Result<()> {
    let exam = parser::load_exam(&exam_path)?;
    let content = std::fs::read_to_string(&answers_path)
        .with_context(|| format!("failed to read answers: {}", answers_path.display()))?;
    let answers: Answers = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse answers: {}", answers_path.display()))?;

    for id in answers.keys().filter(|id| exam.question(id).is_none()) {
        eprintln!("Warning: answer for unknown question '{id}' ignored");
    }

    let card = scoring::compute(&exam, &answers);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&card)?),
        _ => print_card(&card),
    }

    Ok(())
}

fn print_card(card: &ScoreCard) {
    let mut table = Table::new();
    table.set_header(vec!["Question", "Selected", "Correct", "Marks"]);
    for outcome in &card.outcomes {
        table.add_row(vec![
            Cell::new(&outcome.question_id),
            Cell::new(
                outcome
                    .selected_option
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "-".into()),
            ),
            Cell::new(outcome.correct_option),
            Cell::new(format!("{}/{}", outcome.marks_awarded, outcome.marks)),
        ]);
    }
    println!("{table}");

    let s = &card.summary;
    println!(
        "Score: {}/{} ({:.2}%) {}",
        s.obtained_marks,
        s.total_marks,
        s.percentage,
        if s.passed { "PASSED" } else { "FAILED" }
    );
    println!(
        "Correct {}, wrong {}, unanswered {} of {} questions",
        s.correct, s.wrong, s.unanswered, s.total_questions
    );
}
