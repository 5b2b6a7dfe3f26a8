//! Proctoring state machine.
//!
//! The monitor consumes raw environment signals, turns the ones that matter
//! into recorded violations, fans them out to registered handlers, tries to
//! put the student back into fullscreen, and fires the auto-submit handlers
//! once the violation threshold is crossed.
//!
//! ```text
//! Inactive --init--> Active { reentering } --threshold--> Submitting
//!     ^                  |                                    |
//!     +----destroy-------+------------------destroy-----------+
//! ```

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::MonitorError;
use crate::traits::{
    EnvironmentSignal, FullscreenControl, HeadlessFullscreen, LogPresenter, ViolationWarning,
    WarningPresenter,
};

/// Minimum spacing between two recorded violations.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(1000);

/// Delay before trying to re-enter fullscreen after an exit.
pub const REENTRY_DELAY: Duration = Duration::from_millis(500);

/// Kinds of proctoring violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    TabSwitch,
    WindowBlur,
    FullscreenExit,
}

impl ViolationKind {
    /// Label used in student-facing notices.
    pub fn label(&self) -> &'static str {
        match self {
            ViolationKind::TabSwitch => "Tab switch",
            ViolationKind::WindowBlur => "Window focus loss",
            ViolationKind::FullscreenExit => "Fullscreen exit",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::TabSwitch => write!(f, "tab-switch"),
            ViolationKind::WindowBlur => write!(f, "window-blur"),
            ViolationKind::FullscreenExit => write!(f, "fullscreen-exit"),
        }
    }
}

/// One entry of the violation ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub timestamp: DateTime<Utc>,
}

/// A copy of the ledger at some point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationReport {
    pub count: u32,
    pub ledger: Vec<ViolationRecord>,
}

/// Passed to violation handlers.
#[derive(Debug, Clone)]
pub struct ViolationEvent {
    pub record: ViolationRecord,
    pub count: u32,
    pub threshold: u32,
}

/// Monitor configuration for one exam.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Element to put back into fullscreen.
    pub container: String,
    pub auto_submit_on_violation: bool,
    /// Must be at least 1.
    pub violation_threshold: u32,
    pub enable_warnings: bool,
    pub strict_mode: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            container: "exam-container".into(),
            auto_submit_on_violation: true,
            violation_threshold: 3,
            enable_warnings: true,
            strict_mode: false,
        }
    }
}

/// Lifecycle phase of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    Inactive,
    /// Recording violations. `reentering` is set while a fullscreen
    /// re-entry is pending; fullscreen exits are ignored meanwhile because
    /// the re-entry itself produces fullscreen changes.
    Active { reentering: bool },
    /// Threshold crossed; nothing more is recorded.
    Submitting,
}

type ViolationHandler = Arc<dyn Fn(&ViolationEvent) -> anyhow::Result<()> + Send + Sync>;
type AutoSubmitHandler = Arc<dyn Fn(&ViolationReport) -> anyhow::Result<()> + Send + Sync>;

struct Recorded {
    event: ViolationEvent,
    handlers: Vec<ViolationHandler>,
    warn: bool,
    remediate: bool,
    auto_submit: Option<(Vec<AutoSubmitHandler>, ViolationReport)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandlerKind {
    Violation,
    AutoSubmit,
}

struct MonitorInner {
    phase: MonitorPhase,
    config: MonitorConfig,
    ledger: Vec<ViolationRecord>,
    last_recorded: Option<Instant>,
    violation_handlers: Vec<(u64, ViolationHandler)>,
    auto_submit_handlers: Vec<(u64, AutoSubmitHandler)>,
    next_handler_id: u64,
    /// Bumped on every init/destroy so stale re-entry tasks become no-ops.
    generation: u64,
    listener: Option<JoinHandle<()>>,
    reentry: Option<JoinHandle<()>>,
}

impl MonitorInner {
    fn abort_tasks(&mut self) {
        if let Some(task) = self.listener.take() {
            task.abort();
        }
        if let Some(task) = self.reentry.take() {
            task.abort();
        }
    }
}

/// Handle returned by handler registration.
#[must_use = "dropping the handle keeps the handler registered; call unsubscribe() to remove it"]
pub struct Subscription {
    id: u64,
    kind: HandlerKind,
    monitor: Weak<Mutex<MonitorInner>>,
}

impl Subscription {
    /// Remove the handler. Does nothing if the monitor is gone.
    pub fn unsubscribe(self) {
        let Some(inner) = self.monitor.upgrade() else {
            return;
        };
        let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
        match self.kind {
            HandlerKind::Violation => inner.violation_handlers.retain(|(id, _)| *id != self.id),
            HandlerKind::AutoSubmit => inner.auto_submit_handlers.retain(|(id, _)| *id != self.id),
        }
    }
}

/// The proctoring state machine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ViolationMonitor {
    inner: Arc<Mutex<MonitorInner>>,
    fullscreen: Arc<dyn FullscreenControl>,
    presenter: Arc<dyn WarningPresenter>,
}

impl Default for ViolationMonitor {
    fn default() -> Self {
        Self::new(Arc::new(HeadlessFullscreen), Arc::new(LogPresenter))
    }
}

impl ViolationMonitor {
    pub fn new(
        fullscreen: Arc<dyn FullscreenControl>,
        presenter: Arc<dyn WarningPresenter>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MonitorInner {
                phase: MonitorPhase::Inactive,
                config: MonitorConfig::default(),
                ledger: Vec::new(),
                last_recorded: None,
                violation_handlers: Vec::new(),
                auto_submit_handlers: Vec::new(),
                next_handler_id: 0,
                generation: 0,
                listener: None,
                reentry: None,
            })),
            fullscreen,
            presenter,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start monitoring with a fresh ledger.
    ///
    /// Registered handlers survive a re-init; pending tasks do not.
    pub fn init(&self, config: MonitorConfig) -> Result<(), MonitorError> {
        if config.violation_threshold == 0 {
            return Err(MonitorError::InvalidThreshold);
        }
        let mut inner = self.lock();
        inner.abort_tasks();
        inner.generation += 1;
        inner.ledger.clear();
        inner.last_recorded = None;
        inner.phase = MonitorPhase::Active { reentering: false };
        tracing::info!(
            threshold = config.violation_threshold,
            auto_submit = config.auto_submit_on_violation,
            strict = config.strict_mode,
            "violation monitor active"
        );
        inner.config = config;
        Ok(())
    }

    /// Feed signals from `signals` into the monitor until it is destroyed
    /// or the sender side closes. Replaces any previous subscription.
    ///
    /// Outside a tokio runtime the subscription is skipped with a warning.
    pub fn subscribe(&self, mut signals: mpsc::UnboundedReceiver<EnvironmentSignal>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime, environment signals will not be monitored");
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        let fullscreen = Arc::clone(&self.fullscreen);
        let presenter = Arc::clone(&self.presenter);
        let task = runtime.spawn(async move {
            while let Some(signal) = signals.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let monitor = ViolationMonitor {
                    inner,
                    fullscreen: Arc::clone(&fullscreen),
                    presenter: Arc::clone(&presenter),
                };
                monitor.handle_signal(signal);
            }
        });
        if let Some(previous) = self.lock().listener.replace(task) {
            previous.abort();
        }
    }

    /// Register a handler called for every recorded violation.
    pub fn on_violation<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ViolationEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_handler_id;
        inner.next_handler_id += 1;
        inner.violation_handlers.push((id, Arc::new(handler)));
        Subscription {
            id,
            kind: HandlerKind::Violation,
            monitor: Arc::downgrade(&self.inner),
        }
    }

    /// Register a handler called once when the violation threshold is crossed.
    pub fn on_auto_submit<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ViolationReport) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_handler_id;
        inner.next_handler_id += 1;
        inner.auto_submit_handlers.push((id, Arc::new(handler)));
        Subscription {
            id,
            kind: HandlerKind::AutoSubmit,
            monitor: Arc::downgrade(&self.inner),
        }
    }

    /// Process a signal observed now.
    pub fn handle_signal(&self, signal: EnvironmentSignal) -> Option<ViolationRecord> {
        self.handle_signal_at(signal, Instant::now())
    }

    /// Process a signal observed at `now`. Returns the recorded violation,
    /// or `None` when the signal was ignored.
    pub fn handle_signal_at(
        &self,
        signal: EnvironmentSignal,
        now: Instant,
    ) -> Option<ViolationRecord> {
        let kind = signal.violation_kind()?;

        let recorded = {
            let mut inner = self.lock();
            let MonitorPhase::Active { reentering } = inner.phase else {
                tracing::debug!(%kind, phase = ?inner.phase, "signal ignored, monitor not active");
                return None;
            };
            if kind == ViolationKind::FullscreenExit && reentering {
                tracing::debug!("fullscreen exit ignored during re-entry");
                return None;
            }
            if let Some(last) = inner.last_recorded {
                if now.saturating_duration_since(last) < DEBOUNCE_WINDOW {
                    tracing::debug!(%kind, "signal debounced");
                    return None;
                }
            }

            let record = ViolationRecord {
                kind,
                timestamp: Utc::now(),
            };
            inner.ledger.push(record.clone());
            inner.last_recorded = Some(now);

            let count = inner.ledger.len() as u32;
            let threshold = inner.config.violation_threshold;
            tracing::warn!(%kind, count, threshold, "violation recorded");

            let remediate = kind == ViolationKind::FullscreenExit
                && count < threshold
                && self.fullscreen.is_supported();
            if remediate {
                inner.phase = MonitorPhase::Active { reentering: true };
            }

            let auto_submit = if count >= threshold && inner.config.auto_submit_on_violation {
                inner.phase = MonitorPhase::Submitting;
                let handlers: Vec<AutoSubmitHandler> = inner
                    .auto_submit_handlers
                    .drain(..)
                    .map(|(_, h)| h)
                    .collect();
                let report = ViolationReport {
                    count,
                    ledger: inner.ledger.clone(),
                };
                Some((handlers, report))
            } else {
                None
            };

            let handlers: Vec<ViolationHandler> = inner
                .violation_handlers
                .iter()
                .map(|(_, h)| Arc::clone(h))
                .collect();
            Recorded {
                event: ViolationEvent {
                    record,
                    count,
                    threshold,
                },
                handlers,
                warn: inner.config.enable_warnings,
                remediate,
                auto_submit,
            }
        };

        // Handlers run without the lock held so they may call back into
        // the monitor (the session destroys it from its auto-submit path).
        let Recorded {
            event,
            handlers,
            warn,
            remediate,
            auto_submit,
        } = recorded;

        for handler in &handlers {
            invoke_isolated("violation", || handler(&event));
        }

        if warn {
            self.presenter.present(&ViolationWarning::new(
                event.record.kind,
                event.count,
                event.threshold,
            ));
        }

        if remediate {
            self.schedule_reentry();
        }

        if let Some((handlers, report)) = auto_submit {
            tracing::warn!(count = report.count, "violation threshold reached, auto-submitting");
            for handler in &handlers {
                invoke_isolated("auto-submit", || handler(&report));
            }
        }

        Some(event.record)
    }

    fn schedule_reentry(&self) {
        let (generation, target) = {
            let inner = self.lock();
            if inner.phase != (MonitorPhase::Active { reentering: true }) {
                return;
            }
            (inner.generation, inner.config.container.clone())
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime, skipping fullscreen re-entry");
            self.finish_reentry(generation);
            return;
        };

        let monitor = self.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(REENTRY_DELAY).await;
            match monitor.fullscreen.request_fullscreen(&target).await {
                Ok(()) => tracing::info!("fullscreen restored"),
                Err(e) => tracing::warn!("fullscreen re-entry failed: {e:#}"),
            }
            monitor.finish_reentry(generation);
        });

        let mut inner = self.lock();
        if inner.generation == generation {
            if let Some(previous) = inner.reentry.replace(task) {
                previous.abort();
            }
        } else {
            task.abort();
        }
    }

    fn finish_reentry(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        if let MonitorPhase::Active { reentering: true } = inner.phase {
            inner.phase = MonitorPhase::Active { reentering: false };
        }
        inner.reentry = None;
    }

    /// A copy of the current ledger.
    pub fn get_violations(&self) -> ViolationReport {
        let inner = self.lock();
        ViolationReport {
            count: inner.ledger.len() as u32,
            ledger: inner.ledger.clone(),
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        self.lock().phase
    }

    pub fn is_reentering(&self) -> bool {
        matches!(self.phase(), MonitorPhase::Active { reentering: true })
    }

    /// Stop monitoring: cancel pending tasks, drop all handlers, go inactive.
    /// The ledger is kept so it can still be read. Safe to call repeatedly.
    pub fn destroy(&self) {
        let mut inner = self.lock();
        inner.abort_tasks();
        inner.violation_handlers.clear();
        inner.auto_submit_handlers.clear();
        if inner.phase != MonitorPhase::Inactive {
            tracing::info!(count = inner.ledger.len(), "violation monitor destroyed");
            inner.generation += 1;
            inner.phase = MonitorPhase::Inactive;
        }
    }
}

/// Run a handler, logging its error or panic instead of propagating it.
fn invoke_isolated(label: &str, handler: impl FnOnce() -> anyhow::Result<()>) {
    match catch_unwind(AssertUnwindSafe(handler)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("{label} handler failed: {e:#}"),
        Err(_) => tracing::error!("{label} handler panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    struct FakeFullscreen {
        requests: AtomicU32,
        fail: bool,
    }

    impl FakeFullscreen {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                requests: AtomicU32::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl FullscreenControl for FakeFullscreen {
        fn is_supported(&self) -> bool {
            true
        }

        async fn request_fullscreen(&self, _target: &str) -> anyhow::Result<()> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("permission denied");
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPresenter(Mutex<Vec<ViolationWarning>>);

    impl WarningPresenter for RecordingPresenter {
        fn present(&self, warning: &ViolationWarning) {
            self.0.lock().unwrap().push(warning.clone());
        }
    }

    const TAB: EnvironmentSignal = EnvironmentSignal::VisibilityChange { hidden: true };
    const BLUR: EnvironmentSignal = EnvironmentSignal::WindowBlur {
        document_hidden: false,
    };
    const FS_EXIT: EnvironmentSignal = EnvironmentSignal::FullscreenChange { active: false };

    fn config(threshold: u32) -> MonitorConfig {
        MonitorConfig {
            violation_threshold: threshold,
            enable_warnings: false,
            ..Default::default()
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn counting_auto_submit(monitor: &ViolationMonitor) -> Arc<AtomicU32> {
        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        let _sub = monitor.on_auto_submit(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        fired
    }

    #[test]
    fn threshold_fires_auto_submit_exactly_once() {
        for threshold in 1..=5u32 {
            let monitor = ViolationMonitor::default();
            monitor.init(config(threshold)).unwrap();
            let fired = counting_auto_submit(&monitor);

            let start = Instant::now();
            for i in 0..threshold {
                let signal = if i % 2 == 0 { TAB } else { BLUR };
                let at = start + ms(u64::from(i) * 1000);
                assert!(monitor.handle_signal_at(signal, at).is_some());
            }
            assert_eq!(fired.load(Ordering::SeqCst), 1, "threshold {threshold}");
            assert_eq!(monitor.phase(), MonitorPhase::Submitting);

            let late = start + ms(u64::from(threshold) * 1000 + 5000);
            assert!(monitor.handle_signal_at(TAB, late).is_none());
            assert_eq!(monitor.get_violations().count, threshold);
            assert_eq!(fired.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn signals_within_debounce_window_collapse() {
        let monitor = ViolationMonitor::default();
        monitor.init(config(10)).unwrap();
        let start = Instant::now();

        assert!(monitor.handle_signal_at(BLUR, start).is_some());
        assert!(monitor.handle_signal_at(TAB, start + ms(1)).is_none());
        assert!(monitor.handle_signal_at(TAB, start + ms(999)).is_none());
        assert!(monitor.handle_signal_at(TAB, start + ms(1000)).is_some());

        let report = monitor.get_violations();
        assert_eq!(report.count, 2);
        assert_eq!(report.ledger[0].kind, ViolationKind::WindowBlur);
        assert_eq!(report.ledger[1].kind, ViolationKind::TabSwitch);
    }

    #[test]
    fn non_violation_signals_are_ignored() {
        let monitor = ViolationMonitor::default();
        monitor.init(config(3)).unwrap();
        let now = Instant::now();
        assert!(monitor
            .handle_signal_at(EnvironmentSignal::VisibilityChange { hidden: false }, now)
            .is_none());
        assert!(monitor
            .handle_signal_at(
                EnvironmentSignal::WindowBlur {
                    document_hidden: true
                },
                now
            )
            .is_none());
        assert!(monitor
            .handle_signal_at(EnvironmentSignal::FullscreenChange { active: true }, now)
            .is_none());
        assert_eq!(monitor.get_violations().count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn three_distinct_violations_end_the_exam() {
        let fullscreen = FakeFullscreen::new(false);
        let monitor = ViolationMonitor::new(fullscreen.clone(), Arc::new(LogPresenter));
        monitor.init(config(3)).unwrap();
        let fired = counting_auto_submit(&monitor);

        let start = Instant::now();
        monitor.handle_signal_at(TAB, start).unwrap();
        monitor.handle_signal_at(BLUR, start + ms(1000)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        let third = monitor.handle_signal_at(FS_EXIT, start + ms(2000)).unwrap();
        assert_eq!(third.kind, ViolationKind::FullscreenExit);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // The terminal fullscreen exit does not try to restore fullscreen.
        assert_eq!(monitor.phase(), MonitorPhase::Submitting);
        tokio::time::sleep(ms(1000)).await;
        assert_eq!(fullscreen.requests.load(Ordering::SeqCst), 0);

        assert!(monitor.handle_signal_at(TAB, start + ms(4000)).is_none());
        assert_eq!(monitor.get_violations().count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reentry_suppresses_its_own_fullscreen_churn() {
        let fullscreen = FakeFullscreen::new(false);
        let monitor = ViolationMonitor::new(fullscreen.clone(), Arc::new(LogPresenter));
        monitor.init(config(5)).unwrap();

        let start = Instant::now();
        monitor.handle_signal_at(FS_EXIT, start).unwrap();
        assert!(monitor.is_reentering());

        // Past the debounce window, but the re-entry is still pending.
        assert!(monitor.handle_signal_at(FS_EXIT, start + ms(1200)).is_none());
        // Other kinds still count while re-entering.
        assert!(monitor.handle_signal_at(TAB, start + ms(1200)).is_some());

        tokio::time::sleep(REENTRY_DELAY + ms(10)).await;
        assert_eq!(fullscreen.requests.load(Ordering::SeqCst), 1);
        assert!(!monitor.is_reentering());

        assert!(monitor.handle_signal_at(FS_EXIT, start + ms(2500)).is_some());
        assert_eq!(monitor.get_violations().count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reentry_still_clears_the_flag() {
        let fullscreen = FakeFullscreen::new(true);
        let monitor = ViolationMonitor::new(fullscreen.clone(), Arc::new(LogPresenter));
        monitor.init(config(5)).unwrap();

        monitor.handle_signal(FS_EXIT).unwrap();
        assert!(monitor.is_reentering());
        tokio::time::sleep(REENTRY_DELAY * 2).await;
        assert_eq!(fullscreen.requests.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.phase(), MonitorPhase::Active { reentering: false });
    }

    #[test]
    fn without_fullscreen_capability_no_reentry_is_attempted() {
        let monitor = ViolationMonitor::default();
        monitor.init(config(5)).unwrap();
        monitor.handle_signal(FS_EXIT).unwrap();
        assert!(!monitor.is_reentering());
    }

    #[tokio::test(start_paused = true)]
    async fn destroy_cancels_pending_reentry() {
        let fullscreen = FakeFullscreen::new(false);
        let monitor = ViolationMonitor::new(fullscreen.clone(), Arc::new(LogPresenter));
        monitor.init(config(5)).unwrap();
        monitor.handle_signal(FS_EXIT).unwrap();
        monitor.destroy();

        tokio::time::sleep(REENTRY_DELAY * 2).await;
        assert_eq!(fullscreen.requests.load(Ordering::SeqCst), 0);
        assert_eq!(monitor.phase(), MonitorPhase::Inactive);
    }

    #[test]
    fn handler_failures_are_isolated() {
        let monitor = ViolationMonitor::default();
        monitor.init(config(1)).unwrap();

        let reached = Arc::new(AtomicU32::new(0));
        let _failing = monitor.on_violation(|_| anyhow::bail!("subscriber broke"));
        let _panicking = monitor.on_violation(|_| panic!("subscriber panicked"));
        let counter = Arc::clone(&reached);
        let _healthy = monitor.on_violation(move |event| {
            assert_eq!(event.count, 1);
            assert_eq!(event.threshold, 1);
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let _bad_submit = monitor.on_auto_submit(|_| anyhow::bail!("submit broke"));
        let fired = counting_auto_submit(&monitor);

        assert!(monitor.handle_signal(TAB).is_some());
        assert_eq!(reached.load(Ordering::SeqCst), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.get_violations().count, 1);
    }

    #[test]
    fn unsubscribe_removes_only_that_handler() {
        let monitor = ViolationMonitor::default();
        monitor.init(config(10)).unwrap();

        let a = Arc::new(AtomicU32::new(0));
        let b = Arc::new(AtomicU32::new(0));
        let (ca, cb) = (Arc::clone(&a), Arc::clone(&b));
        let sub_a = monitor.on_violation(move |_| {
            ca.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let _sub_b = monitor.on_violation(move |_| {
            cb.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let start = Instant::now();
        monitor.handle_signal_at(TAB, start);
        sub_a.unsubscribe();
        monitor.handle_signal_at(TAB, start + ms(2000));

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn auto_submit_disabled_keeps_recording() {
        let monitor = ViolationMonitor::default();
        monitor
            .init(MonitorConfig {
                auto_submit_on_violation: false,
                ..config(2)
            })
            .unwrap();
        let fired = counting_auto_submit(&monitor);

        let start = Instant::now();
        for i in 0..4 {
            monitor.handle_signal_at(BLUR, start + ms(i * 1000));
        }
        assert_eq!(monitor.get_violations().count, 4);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(matches!(monitor.phase(), MonitorPhase::Active { .. }));
    }

    #[test]
    fn warnings_report_remaining_tolerance() {
        let presenter = Arc::new(RecordingPresenter::default());
        let monitor = ViolationMonitor::new(Arc::new(HeadlessFullscreen), presenter.clone());
        monitor
            .init(MonitorConfig {
                enable_warnings: true,
                ..config(2)
            })
            .unwrap();

        let start = Instant::now();
        monitor.handle_signal_at(TAB, start);
        monitor.handle_signal_at(TAB, start + ms(1000));

        let shown = presenter.0.lock().unwrap();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].remaining, 1);
        assert!(!shown[0].terminal);
        assert!(shown[1].terminal);
    }

    #[test]
    fn warnings_can_be_disabled() {
        let presenter = Arc::new(RecordingPresenter::default());
        let monitor = ViolationMonitor::new(Arc::new(HeadlessFullscreen), presenter.clone());
        monitor.init(config(3)).unwrap();
        monitor.handle_signal(TAB);
        assert!(presenter.0.lock().unwrap().is_empty());
    }

    #[test]
    fn destroy_is_idempotent_and_freezes_the_ledger() {
        let monitor = ViolationMonitor::default();
        assert!(monitor.handle_signal(TAB).is_none(), "inactive monitor records nothing");

        monitor.init(config(3)).unwrap();
        monitor.handle_signal(TAB).unwrap();
        let mut copy = monitor.get_violations();
        copy.ledger.clear();

        monitor.destroy();
        monitor.destroy();
        assert_eq!(monitor.phase(), MonitorPhase::Inactive);
        assert!(monitor.handle_signal_at(BLUR, Instant::now() + ms(5000)).is_none());
        assert_eq!(monitor.get_violations().count, 1);
        assert_eq!(monitor.get_violations().ledger.len(), 1);
    }

    #[test]
    fn init_resets_the_ledger_and_rejects_zero_threshold() {
        let monitor = ViolationMonitor::default();
        assert_eq!(monitor.init(config(0)), Err(MonitorError::InvalidThreshold));
        assert_eq!(monitor.phase(), MonitorPhase::Inactive);

        monitor.init(config(3)).unwrap();
        monitor.handle_signal(TAB).unwrap();
        monitor.init(config(3)).unwrap();
        assert_eq!(monitor.get_violations(), ViolationReport::default());
        assert!(monitor.handle_signal(TAB).is_some(), "debounce is reset too");
    }

    #[tokio::test(start_paused = true)]
    async fn subscribed_channel_feeds_the_monitor() {
        let monitor = ViolationMonitor::default();
        monitor.init(config(10)).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        monitor.subscribe(rx);

        tx.send(TAB).unwrap();
        tx.send(BLUR).unwrap();
        tokio::task::yield_now().await;
        assert_eq!(monitor.get_violations().count, 1, "second signal is debounced");

        tokio::time::advance(ms(1500)).await;
        tx.send(BLUR).unwrap();
        tokio::task::yield_now().await;
        assert_eq!(monitor.get_violations().count, 2);

        monitor.destroy();
        let _ = tx.send(TAB);
        tokio::task::yield_now().await;
        assert_eq!(monitor.get_violations().count, 2);
    }

    #[test]
    fn ledger_serializes_with_type_tags() {
        let record = ViolationRecord {
            kind: ViolationKind::FullscreenExit,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "fullscreen-exit");
    }
}
