//! Mock sink for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use examguard_core::result::ExamResult;
use examguard_core::traits::SubmissionSink;
use examguard_core::SinkError;

/// What a failing mock reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// A transient server error, retried by the pipeline.
    Transient,
    /// A rejection, never retried.
    Rejected,
}

/// A sink that records what it receives and can be told to fail.
pub struct MockSink {
    /// Calls that fail before the sink starts accepting.
    fail_first: u32,
    failure: MockFailure,
    call_count: AtomicU32,
    received: Mutex<Vec<ExamResult>>,
}

impl MockSink {
    /// A sink that accepts everything.
    pub fn new() -> Self {
        Self::failing(0, MockFailure::Transient)
    }

    /// A sink whose first `times` calls fail with `failure`.
    pub fn failing(times: u32, failure: MockFailure) -> Self {
        Self {
            fail_first: times,
            failure,
            call_count: AtomicU32::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    /// A sink that never accepts.
    pub fn unavailable() -> Self {
        Self::failing(u32::MAX, MockFailure::Transient)
    }

    /// Number of delivery attempts seen, failed ones included.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Results accepted so far, in order.
    pub fn received(&self) -> Vec<ExamResult> {
        self.received
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn last_result(&self) -> Option<ExamResult> {
        self.received().pop()
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubmissionSink for MockSink {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, result: &ExamResult) -> anyhow::Result<()> {
        let call = self.call_count.fetch_add(1, Ordering::Relaxed);
        if call < self.fail_first {
            let err = match self.failure {
                MockFailure::Transient => SinkError::Http {
                    status: 503,
                    message: "mock sink unavailable".into(),
                },
                MockFailure::Rejected => SinkError::Rejected {
                    status: 400,
                    message: "mock sink rejected the result".into(),
                },
            };
            return Err(err.into());
        }
        self.received
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use examguard_core::model::{ExamDefinition, StudentInfo};
    use examguard_core::monitor::ViolationReport;
    use examguard_core::result::{ResultTiming, SubmissionType};
    use examguard_core::scoring;
    use examguard_core::store::MemoryStore;
    use examguard_core::submission::{PipelineConfig, SubmissionPipeline};

    fn result() -> ExamResult {
        let exam: ExamDefinition = serde_json::from_value(serde_json::json!({
            "id": "geo-2",
            "settings": {"durationMinutes": 5},
            "questions": [{"id": "q1", "text": "Capital of France?", "correctOption": "C"}]
        }))
        .unwrap();
        let now = chrono::Utc::now();
        ExamResult::new(
            StudentInfo {
                name: "Grace".into(),
                roll_number: "3".into(),
                email: None,
            },
            &exam,
            scoring::compute(&exam, &Default::default()),
            ResultTiming {
                started_at: now,
                submitted_at: now,
                duration_allowed_minutes: 5,
                time_taken_seconds: 300,
            },
            SubmissionType::AutoTimeout,
            ViolationReport::default(),
        )
    }

    fn pipeline(sink: Arc<MockSink>) -> SubmissionPipeline {
        SubmissionPipeline::new(
            Some(sink as Arc<dyn SubmissionSink>),
            Arc::new(MemoryStore::new()),
            PipelineConfig {
                max_attempts: 3,
                retry_delay: Duration::from_millis(10),
            },
        )
    }

    #[tokio::test]
    async fn records_accepted_results() {
        let sink = MockSink::new();
        let result = result();
        sink.send(&result).await.unwrap();
        assert_eq!(sink.call_count(), 1);
        assert_eq!(sink.last_result(), Some(result));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let sink = Arc::new(MockSink::failing(2, MockFailure::Transient));
        let outcome = pipeline(sink.clone()).finalize(&result()).await;
        assert!(outcome.success);
        assert_eq!(sink.call_count(), 3);
        assert_eq!(sink.received().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_stops_retrying() {
        let sink = Arc::new(MockSink::failing(1, MockFailure::Rejected));
        let pipeline = pipeline(sink.clone());
        let result = result();
        let outcome = pipeline.finalize(&result).await;
        assert!(!outcome.success);
        assert_eq!(sink.call_count(), 1);
        assert!(outcome.error.unwrap().contains("rejected"));
        assert_eq!(pipeline.pending_results().unwrap(), vec![result]);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_sink_keeps_result_pending() {
        let sink = Arc::new(MockSink::unavailable());
        let pipeline = pipeline(sink.clone());
        let outcome = pipeline.finalize(&result()).await;
        assert!(!outcome.success);
        assert_eq!(sink.call_count(), 3);
        assert_eq!(pipeline.pending_results().unwrap().len(), 1);
    }
}
