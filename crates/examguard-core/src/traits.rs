//! Host capability traits.
//!
//! The proctoring core never talks to a browser, a disk or a network
//! directly. Hosts implement these traits and inject them; missing
//! capabilities degrade to no-ops instead of blocking the exam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::monitor::ViolationKind;
use crate::result::ExamResult;

// ---------------------------------------------------------------------------
// Environment signals
// ---------------------------------------------------------------------------

/// A raw environment signal delivered by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "kebab-case")]
pub enum EnvironmentSignal {
    /// The document's visibility changed.
    VisibilityChange { hidden: bool },
    /// The window lost focus.
    WindowBlur { document_hidden: bool },
    /// The document entered or left fullscreen.
    FullscreenChange { active: bool },
}

impl EnvironmentSignal {
    /// The violation this signal represents, if any.
    ///
    /// A blur while the document is hidden is the tail of a tab switch and is
    /// not a separate violation.
    pub fn violation_kind(&self) -> Option<ViolationKind> {
        match *self {
            EnvironmentSignal::VisibilityChange { hidden: true } => Some(ViolationKind::TabSwitch),
            EnvironmentSignal::WindowBlur {
                document_hidden: false,
            } => Some(ViolationKind::WindowBlur),
            EnvironmentSignal::FullscreenChange { active: false } => {
                Some(ViolationKind::FullscreenExit)
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Fullscreen
// ---------------------------------------------------------------------------

/// Ability to put an element of the exam page into fullscreen.
#[async_trait]
pub trait FullscreenControl: Send + Sync {
    /// Whether the platform can enter fullscreen at all.
    fn is_supported(&self) -> bool;

    /// Ask the platform to show `target` fullscreen.
    async fn request_fullscreen(&self, target: &str) -> anyhow::Result<()>;
}

/// Fullscreen control for hosts without the capability.
pub struct HeadlessFullscreen;

#[async_trait]
impl FullscreenControl for HeadlessFullscreen {
    fn is_supported(&self) -> bool {
        false
    }

    async fn request_fullscreen(&self, _target: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// String key-value persistence backing snapshots and fallback results.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Removing a missing key is not an error.
    fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// All keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> anyhow::Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// Submission sink
// ---------------------------------------------------------------------------

/// Best-effort delivery channel for finished results.
///
/// A sink may be unable to observe whether the far end accepted the
/// payload; returning `Ok(())` means "no observable failure".
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// Human-readable sink name (e.g. "webhook").
    fn name(&self) -> &str;

    async fn send(&self, result: &ExamResult) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// A notice shown to the student after a recorded violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationWarning {
    pub kind: ViolationKind,
    pub count: u32,
    pub threshold: u32,
    /// Violations left before the exam ends.
    pub remaining: u32,
    /// The exam is being terminated.
    pub terminal: bool,
}

impl ViolationWarning {
    pub fn new(kind: ViolationKind, count: u32, threshold: u32) -> Self {
        Self {
            kind,
            count,
            threshold,
            remaining: threshold.saturating_sub(count),
            terminal: count >= threshold,
        }
    }

    /// The text of the notice.
    pub fn message(&self) -> String {
        if self.terminal {
            format!(
                "{} detected. Violation limit reached ({}/{}); your exam is being submitted.",
                self.kind.label(),
                self.count,
                self.threshold
            )
        } else {
            format!(
                "{} detected. Warning {}/{}: {} more violation(s) will end your exam.",
                self.kind.label(),
                self.count,
                self.threshold,
                self.remaining
            )
        }
    }
}

/// Presents blocking violation notices to the student.
pub trait WarningPresenter: Send + Sync {
    fn present(&self, warning: &ViolationWarning);
}

/// Presenter that writes notices to the log.
pub struct LogPresenter;

impl WarningPresenter for LogPresenter {
    fn present(&self, warning: &ViolationWarning) {
        tracing::warn!(
            kind = %warning.kind,
            count = warning.count,
            threshold = warning.threshold,
            "{}",
            warning.message()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_classification() {
        assert_eq!(
            EnvironmentSignal::VisibilityChange { hidden: true }.violation_kind(),
            Some(ViolationKind::TabSwitch)
        );
        assert_eq!(
            EnvironmentSignal::VisibilityChange { hidden: false }.violation_kind(),
            None
        );
        assert_eq!(
            EnvironmentSignal::WindowBlur {
                document_hidden: false
            }
            .violation_kind(),
            Some(ViolationKind::WindowBlur)
        );
        assert_eq!(
            EnvironmentSignal::WindowBlur {
                document_hidden: true
            }
            .violation_kind(),
            None
        );
        assert_eq!(
            EnvironmentSignal::FullscreenChange { active: false }.violation_kind(),
            Some(ViolationKind::FullscreenExit)
        );
        assert_eq!(
            EnvironmentSignal::FullscreenChange { active: true }.violation_kind(),
            None
        );
    }

    #[test]
    fn signal_json_shape() {
        let sig: EnvironmentSignal =
            serde_json::from_str(r#"{"signal": "fullscreen-change", "active": false}"#).unwrap();
        assert_eq!(sig, EnvironmentSignal::FullscreenChange { active: false });
    }

    #[test]
    fn warning_messages() {
        let w = ViolationWarning::new(ViolationKind::TabSwitch, 1, 3);
        assert_eq!(w.remaining, 2);
        assert!(!w.terminal);
        assert!(w.message().contains("2 more violation(s)"));

        let w = ViolationWarning::new(ViolationKind::FullscreenExit, 3, 3);
        assert!(w.terminal);
        assert!(w.message().contains("being submitted"));
    }
}
