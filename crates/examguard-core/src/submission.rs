//! Result delivery with retry and local fallback.
//!
//! `finalize` never fails: a result either reaches the sink, or it is kept
//! in the local store under a pending key until `resend_pending` gets it out.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SinkError;
use crate::result::ExamResult;
use crate::traits::{KeyValueStore, SubmissionSink};

/// Store key prefix for results that could not be delivered.
pub const PENDING_PREFIX: &str = "examguard.pending.";

/// Retry policy for sink delivery.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Total delivery attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// What happened to a result handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub success: bool,
    pub submission_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

impl SubmissionOutcome {
    fn delivered(submission_id: Uuid) -> Self {
        Self {
            success: true,
            submission_id,
            timestamp: Utc::now(),
            error: None,
        }
    }

    fn failed(submission_id: Uuid, error: String) -> Self {
        Self {
            success: false,
            submission_id,
            timestamp: Utc::now(),
            error: Some(error),
        }
    }
}

pub struct SubmissionPipeline {
    sink: Option<Arc<dyn SubmissionSink>>,
    store: Arc<dyn KeyValueStore>,
    config: PipelineConfig,
}

impl SubmissionPipeline {
    pub fn new(
        sink: Option<Arc<dyn SubmissionSink>>,
        store: Arc<dyn KeyValueStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            sink,
            store,
            config,
        }
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Deliver `result`, falling back to local storage. Always returns.
    pub async fn finalize(&self, result: &ExamResult) -> SubmissionOutcome {
        let id = result.submission_id;

        let Some(sink) = &self.sink else {
            tracing::warn!(%id, "no submission sink configured, keeping result locally");
            self.store_locally(result);
            return SubmissionOutcome::failed(
                id,
                "local-only: no submission sink configured; result kept in local storage".into(),
            );
        };

        match self.deliver(sink.as_ref(), result).await {
            Ok(()) => {
                tracing::info!(%id, sink = sink.name(), "result submitted");
                SubmissionOutcome::delivered(id)
            }
            Err(reason) => {
                tracing::error!(%id, sink = sink.name(), "submission failed: {reason}");
                self.store_locally(result);
                SubmissionOutcome::failed(id, reason)
            }
        }
    }

    async fn deliver(&self, sink: &dyn SubmissionSink, result: &ExamResult) -> Result<(), String> {
        let attempts = self.config.max_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.retry_delay).await;
            }
            match sink.send(result).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(attempt, attempts, "delivery attempt failed: {e:#}");
                    let permanent = e
                        .downcast_ref::<SinkError>()
                        .is_some_and(SinkError::is_permanent);
                    last_error = Some(e);
                    if permanent {
                        break;
                    }
                }
            }
        }
        Err(last_error
            .map(|e| format!("{e:#}"))
            .unwrap_or_else(|| "unknown error".into()))
    }

    fn store_locally(&self, result: &ExamResult) {
        let key = pending_key(result.submission_id);
        let stored = serde_json::to_string(result)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.store.set(&key, &json));
        match stored {
            Ok(()) => tracing::info!(%key, "result stored for later delivery"),
            Err(e) => tracing::error!(%key, "failed to store result locally: {e:#}"),
        }
    }

    /// Results waiting in local storage. Unreadable entries are skipped.
    pub fn pending_results(&self) -> anyhow::Result<Vec<ExamResult>> {
        let mut results = Vec::new();
        for key in self.store.keys(PENDING_PREFIX)? {
            let Some(raw) = self.store.get(&key)? else {
                continue;
            };
            match serde_json::from_str::<ExamResult>(&raw) {
                Ok(result) => results.push(result),
                Err(e) => tracing::warn!(%key, "skipping unreadable pending result: {e}"),
            }
        }
        Ok(results)
    }

    /// Try to deliver every pending result, removing the ones that succeed.
    pub async fn resend_pending(&self) -> anyhow::Result<Vec<SubmissionOutcome>> {
        let Some(sink) = &self.sink else {
            anyhow::bail!("no submission sink configured");
        };

        let mut outcomes = Vec::new();
        for result in self.pending_results()? {
            let id = result.submission_id;
            match self.deliver(sink.as_ref(), &result).await {
                Ok(()) => {
                    self.store.delete(&pending_key(id))?;
                    tracing::info!(%id, "pending result delivered");
                    outcomes.push(SubmissionOutcome::delivered(id));
                }
                Err(reason) => outcomes.push(SubmissionOutcome::failed(id, reason)),
            }
        }
        Ok(outcomes)
    }
}

pub fn pending_key(submission_id: Uuid) -> String {
    format!("{PENDING_PREFIX}{submission_id}")
}
