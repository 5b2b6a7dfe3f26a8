use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use examguard_core::model::{Answers, OptionKey};
use examguard_core::parser::parse_exam_str;
use examguard_core::scoring::compute;

fn generate_exam_json(questions: usize) -> String {
    let mut items = Vec::with_capacity(questions);
    for i in 0..questions {
        let correct = OptionKey::ALL[i % 4];
        items.push(format!(
            r#"{{"id": "q{i}", "number": {n}, "text": "Question {n}?",
  "options": {{"A": "alpha", "B": "beta", "C": "gamma", "D": "delta"}},
  "correctOption": "{correct}", "marks": {marks}}}"#,
            n = i + 1,
            marks = i % 3 + 1,
        ));
    }
    format!(
        r#"{{"id": "bench", "metadata": {{"title": "Bench"}},
  "settings": {{"durationMinutes": 60}},
  "questions": [{}]}}"#,
        items.join(",\n")
    )
}

fn answers_for(questions: usize) -> Answers {
    // Every third question unanswered, every other answered question wrong.
    (0..questions)
        .filter(|i| i % 3 != 0)
        .map(|i| {
            let key = if i % 2 == 0 {
                OptionKey::ALL[i % 4]
            } else {
                OptionKey::ALL[(i + 1) % 4]
            };
            (format!("q{i}"), key)
        })
        .collect()
}

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");

    for size in [10, 100, 1000] {
        let json = generate_exam_json(size);
        let exam = parse_exam_str(&json, Path::new("bench.json")).unwrap();
        let answers = answers_for(size);

        group.bench_function(format!("{size}_questions"), |b| {
            b.iter(|| compute(black_box(&exam), black_box(&answers)))
        });
    }

    group.finish();
}

fn bench_exam_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("exam_parsing");

    let small = generate_exam_json(10);
    let large = generate_exam_json(500);

    group.bench_function("10_questions", |b| {
        b.iter(|| parse_exam_str(black_box(&small), Path::new("bench.json")))
    });

    group.bench_function("500_questions", |b| {
        b.iter(|| parse_exam_str(black_box(&large), Path::new("bench.json")))
    });

    group.finish();
}

criterion_group!(benches, bench_scoring, bench_exam_parsing);
criterion_main!(benches);
