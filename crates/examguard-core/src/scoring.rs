//! Deterministic scoring of answers against an exam definition.
//!
//! Scoring is a pure function of the exam and the answers, so a stored result
//! can always be re-scored for audit and must come out identical.

use serde::{Deserialize, Serialize};

use crate::model::{Answers, ExamDefinition, OptionKey};

/// How a single question was answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub question_id: String,
    pub selected_option: Option<OptionKey>,
    pub correct_option: OptionKey,
    pub is_correct: bool,
    /// Marks the question is worth.
    pub marks: u32,
    pub marks_awarded: u32,
}

/// Aggregate score for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringSummary {
    pub total_questions: usize,
    pub attempted: usize,
    pub correct: usize,
    pub wrong: usize,
    pub unanswered: usize,
    pub total_marks: u64,
    pub obtained_marks: u64,
    /// Percentage rounded to two decimals.
    pub percentage: f64,
    pub passed: bool,
}

/// Summary plus the per-question breakdown, in exam order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub summary: ScoringSummary,
    pub outcomes: Vec<AnswerOutcome>,
}

/// Score `answers` against `exam`.
///
/// Missing answers are unanswered, never an error. Answers for ids the exam
/// does not contain are ignored.
pub fn compute(exam: &ExamDefinition, answers: &Answers) -> ScoreCard {
    let outcomes: Vec<AnswerOutcome> = exam
        .questions
        .iter()
        .map(|q| {
            let marks = q.effective_marks();
            let selected = answers.get(&q.id).copied();
            let is_correct = selected == Some(q.correct_option);
            AnswerOutcome {
                question_id: q.id.clone(),
                selected_option: selected,
                correct_option: q.correct_option,
                is_correct,
                marks,
                marks_awarded: if is_correct { marks } else { 0 },
            }
        })
        .collect();

    let attempted = outcomes
        .iter()
        .filter(|o| o.selected_option.is_some())
        .count();
    let correct = outcomes.iter().filter(|o| o.is_correct).count();
    let total_marks: u64 = outcomes.iter().map(|o| u64::from(o.marks)).sum();
    let obtained_marks: u64 = outcomes.iter().map(|o| u64::from(o.marks_awarded)).sum();
    let percentage = percentage(obtained_marks, total_marks);

    ScoreCard {
        summary: ScoringSummary {
            total_questions: outcomes.len(),
            attempted,
            correct,
            wrong: attempted - correct,
            unanswered: outcomes.len() - attempted,
            total_marks,
            obtained_marks,
            percentage,
            passed: percentage >= exam.settings.pass_mark,
        },
        outcomes,
    }
}

/// `obtained / total` as a percentage with two decimals, 0 when `total` is 0.
pub fn percentage(obtained: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (obtained as f64 / total as f64 * 10_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExamSettings, Question};
    use std::collections::BTreeMap;

    fn question(id: &str, correct: OptionKey, marks: Option<i64>) -> Question {
        Question {
            id: id.into(),
            number: 0,
            text: format!("question {id}"),
            options: OptionKey::ALL
                .iter()
                .map(|k| (*k, format!("option {k}")))
                .collect(),
            correct_option: correct,
            marks,
        }
    }

    fn exam(questions: Vec<Question>) -> ExamDefinition {
        ExamDefinition {
            id: "exam".into(),
            metadata: Default::default(),
            settings: ExamSettings {
                duration_minutes: Some(10),
                ..Default::default()
            },
            questions,
        }
    }

    #[test]
    fn weighted_marks_below_pass_mark() {
        let exam = exam(vec![
            question("Q1", OptionKey::A, Some(5)),
            question("Q2", OptionKey::B, Some(10)),
        ]);
        let answers: Answers = [("Q1".to_string(), OptionKey::A), ("Q2".to_string(), OptionKey::C)]
            .into_iter()
            .collect();

        let card = compute(&exam, &answers);
        assert_eq!(card.summary.obtained_marks, 5);
        assert_eq!(card.summary.total_marks, 15);
        assert_eq!(card.summary.percentage, 33.33);
        assert!(!card.summary.passed);
        assert_eq!(card.summary.correct, 1);
        assert_eq!(card.summary.wrong, 1);
        assert_eq!(card.summary.unanswered, 0);
        assert_eq!(card.outcomes[1].marks_awarded, 0);
        assert_eq!(card.outcomes[1].selected_option, Some(OptionKey::C));
    }

    #[test]
    fn unanswered_is_not_an_error() {
        let exam = exam(vec![
            question("Q1", OptionKey::A, None),
            question("Q2", OptionKey::B, None),
        ]);
        let card = compute(&exam, &BTreeMap::new());
        assert_eq!(card.summary.attempted, 0);
        assert_eq!(card.summary.unanswered, 2);
        assert_eq!(card.summary.total_marks, 2);
        assert_eq!(card.summary.percentage, 0.0);
        assert!(card.outcomes.iter().all(|o| o.selected_option.is_none()));
    }

    #[test]
    fn pass_mark_is_inclusive() {
        let exam = exam(vec![
            question("Q1", OptionKey::A, Some(1)),
            question("Q2", OptionKey::B, Some(1)),
        ]);
        let answers: Answers = [("Q1".to_string(), OptionKey::A)].into_iter().collect();
        let card = compute(&exam, &answers);
        assert_eq!(card.summary.percentage, 50.0);
        assert!(card.summary.passed);
    }

    #[test]
    fn non_positive_marks_default_to_one() {
        let exam = exam(vec![
            question("Q1", OptionKey::D, Some(0)),
            question("Q2", OptionKey::D, Some(-3)),
        ]);
        let answers: Answers = [("Q1".to_string(), OptionKey::D)].into_iter().collect();
        let card = compute(&exam, &answers);
        assert_eq!(card.summary.total_marks, 2);
        assert_eq!(card.summary.obtained_marks, 1);
    }

    #[test]
    fn empty_exam_scores_zero() {
        let card = compute(&exam(vec![]), &BTreeMap::new());
        assert_eq!(card.summary.total_marks, 0);
        assert_eq!(card.summary.percentage, 0.0);
        assert!(!card.summary.passed);
    }

    #[test]
    fn unknown_question_ids_are_ignored() {
        let exam = exam(vec![question("Q1", OptionKey::A, Some(2))]);
        let answers: Answers = [("ghost".to_string(), OptionKey::A)].into_iter().collect();
        let card = compute(&exam, &answers);
        assert_eq!(card.summary.attempted, 0);
        assert_eq!(card.outcomes.len(), 1);
    }

    #[test]
    fn deterministic_and_bounded() {
        let exam = exam(
            (0..20)
                .map(|i| question(&format!("Q{i}"), OptionKey::ALL[i % 4], Some(i as i64)))
                .collect(),
        );
        let answers: Answers = (0..20)
            .filter(|i| i % 3 != 0)
            .map(|i| (format!("Q{i}"), OptionKey::ALL[(i * 7) % 4]))
            .collect();

        let first = compute(&exam, &answers);
        let second = compute(&exam, &answers);
        assert_eq!(first, second);
        assert!(first.summary.obtained_marks <= first.summary.total_marks);
        assert_eq!(
            first.summary.attempted + first.summary.unanswered,
            first.summary.total_questions
        );
    }

    #[test]
    fn percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(15, 15), 100.0);
    }
}
