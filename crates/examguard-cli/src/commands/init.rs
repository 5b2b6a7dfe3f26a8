//! The `examguard init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("examguard.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("exams")?;
    write_if_missing(Path::new("exams/example.json"), EXAMPLE_EXAM)?;
    write_if_missing(Path::new("exams/example-session.json"), EXAMPLE_SESSION)?;

    println!("\nNext steps:");
    println!("  1. Point [sink].url in examguard.toml at your webhook (or set EXAMGUARD_WEBHOOK_URL)");
    println!("  2. Run: examguard validate --exam exams/example.json");
    println!("  3. Run: examguard replay --exam exams/example.json --script exams/example-session.json");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examguard configuration

# Uncomment to deliver results to a webhook. Without a sink, results are
# kept in [storage].dir and can be sent later with `examguard resend`.
# [sink]
# type = "webhook"
# url = "${EXAMGUARD_WEBHOOK_URL}"
# opaque = true
# timeout_secs = 30

[submission]
max_attempts = 3
retry_delay_ms = 2000

[storage]
dir = "./examguard-data"

[proctoring]
container = "exam-container"
enable_warnings = true
"#;

const EXAMPLE_EXAM: &str = r#"{
  "id": "example",
  "metadata": {
    "title": "Example Exam",
    "subject": "General Knowledge",
    "description": "A short exam to get started",
    "instructions": "Stay on this page until you submit."
  },
  "settings": {
    "durationMinutes": 1,
    "totalMarks": 15,
    "passMark": 50,
    "violationThreshold": 3,
    "autoSubmitOnViolation": true,
    "strictMode": false
  },
  "questions": [
    {
      "id": "q1",
      "number": 1,
      "text": "Which planet is closest to the sun?",
      "options": {"A": "Mercury", "B": "Venus", "C": "Earth", "D": "Mars"},
      "correctOption": "A",
      "marks": 5
    },
    {
      "id": "q2",
      "number": 2,
      "text": "What is 7 x 8?",
      "options": {"A": "54", "B": "56", "C": "58", "D": "64"},
      "correctOption": "B",
      "marks": 10
    }
  ]
}
"#;

const EXAMPLE_SESSION: &str = r#"{
  "student": {"name": "Example Student", "rollNumber": "001"},
  "events": [
    {"atMs": 3000, "action": "answer", "question": "q1", "option": "A"},
    {"atMs": 5000, "action": "navigate", "index": 1},
    {"atMs": 9000, "action": "signal", "signal": "visibility-change", "hidden": true},
    {"atMs": 12000, "action": "answer", "question": "q2", "option": "C"},
    {"atMs": 20000, "action": "submit"}
  ]
}
"#;
