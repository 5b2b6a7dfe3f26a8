//! examguard-sinks — where finished exam results go.
//!
//! Implements the `SubmissionSink` trait for HTTP webhooks and an in-memory
//! mock, and loads the `examguard.toml` configuration that wires a sink,
//! the retry policy and the fallback store together.

pub mod config;
pub mod error;
pub mod mock;
pub mod webhook;

pub use config::{create_sink, load_config, load_config_from, ExamguardConfig, SinkConfig};
pub use error::ConfigError;
pub use examguard_core::SinkError;
pub use mock::{MockFailure, MockSink};
pub use webhook::WebhookSink;
