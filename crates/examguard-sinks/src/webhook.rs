//! HTTP webhook sink.
//!
//! Posts the result document as JSON. Spreadsheet webhooks are usually
//! called from an opaque context where the response cannot be read, so in
//! opaque mode every HTTP response counts as delivered and only transport
//! failures surface.

use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use examguard_core::result::ExamResult;
use examguard_core::traits::SubmissionSink;
use examguard_core::SinkError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Delivers results to an HTTP endpoint.
pub struct WebhookSink {
    url: reqwest::Url,
    opaque: bool,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: &str, opaque: bool, timeout_secs: u64) -> Result<Self, SinkError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| SinkError::Misconfigured(format!("invalid webhook url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SinkError::Misconfigured(format!(
                "unsupported webhook scheme: {}",
                url.scheme()
            )));
        }

        let timeout_secs = if timeout_secs == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            timeout_secs
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SinkError::Misconfigured(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url,
            opaque,
            timeout_secs,
            client,
        })
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    fn classify(&self, e: reqwest::Error) -> SinkError {
        if e.is_timeout() {
            SinkError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            SinkError::Network(format!("webhook not reachable at {}", self.host()))
        } else {
            SinkError::Network(e.to_string())
        }
    }

    /// Host part of the URL; the path and query may carry a secret.
    fn host(&self) -> &str {
        self.url.host_str().unwrap_or("<unknown>")
    }
}

#[async_trait]
impl SubmissionSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    #[instrument(skip(self, result), fields(id = %result.submission_id, host = self.host()))]
    async fn send(&self, result: &ExamResult) -> anyhow::Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(result)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        if self.opaque {
            tracing::debug!(status, "opaque webhook answered");
            return Ok(());
        }

        if (400..500).contains(&status) {
            let message = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected { status, message }.into());
        }
        if status >= 500 {
            let message = response.text().await.unwrap_or_default();
            return Err(SinkError::Http { status, message }.into());
        }
        Ok(())
    }
}

impl std::fmt::Debug for WebhookSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSink")
            .field("host", &self.host())
            .field("opaque", &self.opaque)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
