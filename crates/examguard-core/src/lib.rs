//! examguard-core — Proctoring state machine, exam sessions, and scoring.
//!
//! This crate defines the exam data model, the violation monitor that turns
//! environment signals into a violation ledger, the session controller that
//! owns the countdown and answers, the pure scoring engine, and the
//! submission pipeline that delivers results to an external sink.

pub mod error;
pub mod model;
pub mod monitor;
pub mod parser;
pub mod result;
pub mod scoring;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod submission;
pub mod traits;

pub use error::{MonitorError, SessionError, SinkError, SnapshotError};
pub use model::{Answers, ExamDefinition, OptionKey, Question, StudentInfo};
pub use monitor::{MonitorConfig, MonitorPhase, ViolationMonitor};
pub use result::{ExamResult, SubmissionType};
pub use session::{SessionConfig, SessionController};
pub use submission::{PipelineConfig, SubmissionOutcome, SubmissionPipeline};
