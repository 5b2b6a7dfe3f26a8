//! Configuration loading and the sink factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examguard_core::session::SessionConfig;
use examguard_core::submission::PipelineConfig;
use examguard_core::traits::SubmissionSink;

use crate::error::ConfigError;
use crate::webhook::{WebhookSink, DEFAULT_TIMEOUT_SECS};

/// Environment variable that overrides the webhook URL.
pub const WEBHOOK_URL_ENV: &str = "EXAMGUARD_WEBHOOK_URL";

/// Where submitted results are delivered.
///
/// Note: Custom Debug impl masks the webhook URL, which usually embeds a
/// deployment secret.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    Webhook {
        url: String,
        /// The endpoint's responses cannot be read; any answer is success.
        #[serde(default = "default_true")]
        opaque: bool,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
    /// No remote sink; results stay in the local store.
    Local,
}

impl std::fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkConfig::Webhook {
                url: _,
                opaque,
                timeout_secs,
            } => f
                .debug_struct("Webhook")
                .field("url", &"***")
                .field("opaque", opaque)
                .field("timeout_secs", timeout_secs)
                .finish(),
            SinkConfig::Local => f.write_str("Local"),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Retry policy for result delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionSettings {
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_attempts() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    2000
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

/// Local storage for snapshots and undelivered results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./examguard-data")
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProctoringSettings {
    /// Element that is put into fullscreen.
    #[serde(default = "default_container")]
    pub container: String,
    /// Show a notice for every recorded violation.
    #[serde(default = "default_true")]
    pub enable_warnings: bool,
}

fn default_container() -> String {
    "exam-container".to_string()
}

impl Default for ProctoringSettings {
    fn default() -> Self {
        Self {
            container: default_container(),
            enable_warnings: true,
        }
    }
}

/// Top-level examguard configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExamguardConfig {
    /// Remote sink. Absent means local-only.
    #[serde(default)]
    pub sink: Option<SinkConfig>,
    #[serde(default)]
    pub submission: SubmissionSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub proctoring: ProctoringSettings,
}

impl ExamguardConfig {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_attempts: self.submission.max_attempts,
            retry_delay: Duration::from_millis(self.submission.retry_delay_ms),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            container: self.proctoring.container.clone(),
            enable_warnings: self.proctoring.enable_warnings,
            ..SessionConfig::default()
        }
    }

    /// Check values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(SinkConfig::Webhook { url, .. }) = &self.sink {
            if url.trim().is_empty() {
                return Err(ConfigError::MissingUrl);
            }
        }
        if self.submission.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "submission.max_attempts",
                message: "must be at least 1".into(),
            });
        }
        if self.proctoring.container.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "proctoring.container",
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }

    fn apply_overrides(&mut self, webhook_url: Option<String>) {
        let Some(new_url) = webhook_url.filter(|u| !u.trim().is_empty()) else {
            return;
        };
        match &mut self.sink {
            Some(SinkConfig::Webhook { url, .. }) => *url = new_url,
            _ => {
                self.sink = Some(SinkConfig::Webhook {
                    url: new_url,
                    opaque: true,
                    timeout_secs: DEFAULT_TIMEOUT_SECS,
                })
            }
        }
    }

    fn resolve_env(&mut self) {
        if let Some(SinkConfig::Webhook { url, .. }) = &mut self.sink {
            *url = resolve_env_vars(url);
        }
        self.storage.dir = PathBuf::from(resolve_env_vars(&self.storage.dir.to_string_lossy()));
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
/// Unset variables resolve to the empty string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + end];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examguard.toml` in the current directory
/// 2. `~/.config/examguard/config.toml`
///
/// `EXAMGUARD_WEBHOOK_URL` overrides the configured webhook URL.
pub fn load_config() -> Result<ExamguardConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamguardConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => return Err(ConfigError::NotFound(p.to_path_buf()).into()),
        None => {
            let local = PathBuf::from("examguard.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded config");
            config
        }
        None => ExamguardConfig::default(),
    };

    config.apply_overrides(std::env::var(WEBHOOK_URL_ENV).ok());
    config.validate()?;
    Ok(config)
}

/// Parse a TOML config string and expand `${VAR}` references.
pub fn parse_config_str(content: &str) -> Result<ExamguardConfig> {
    let mut config: ExamguardConfig = toml::from_str(content)?;
    config.resolve_env();
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examguard"))
}

/// Create the configured sink. `None` means results stay local.
pub fn create_sink(config: Option<&SinkConfig>) -> Result<Option<Arc<dyn SubmissionSink>>> {
    match config {
        Some(SinkConfig::Webhook {
            url,
            opaque,
            timeout_secs,
        }) => {
            let sink = WebhookSink::new(url, *opaque, *timeout_secs)?;
            Ok(Some(Arc::new(sink)))
        }
        Some(SinkConfig::Local) | None => Ok(None),
    }
}
