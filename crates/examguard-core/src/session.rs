//! Exam session lifecycle.
//!
//! The controller owns the countdown, the answers and the navigation
//! position, persists them for crash recovery, owns the violation monitor for
//! the session, and runs the one-and-only submission.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

use crate::error::SessionError;
use crate::model::{Answers, ExamDefinition, OptionKey, Question, StudentInfo};
use crate::monitor::{MonitorConfig, ViolationMonitor};
use crate::result::{ExamResult, ResultTiming, SubmissionType};
use crate::scoring;
use crate::snapshot::{SessionSnapshot, SessionTiming, SNAPSHOT_KEY};
use crate::submission::{SubmissionOutcome, SubmissionPipeline};
use crate::traits::{
    EnvironmentSignal, FullscreenControl, HeadlessFullscreen, KeyValueStore, LogPresenter,
    WarningPresenter,
};

/// Controller settings that do not come from the exam itself.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Store key of the persisted snapshot.
    pub snapshot_key: String,
    /// Persist a snapshot every this many seconds of countdown.
    pub persist_every_secs: u64,
    /// Element put into fullscreen at start and on remediation.
    pub container: String,
    pub enable_warnings: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            snapshot_key: SNAPSHOT_KEY.to_string(),
            persist_every_secs: 5,
            container: "exam-container".into(),
            enable_warnings: true,
        }
    }
}

/// Collaborators injected into a controller.
pub struct SessionDeps {
    pub store: Arc<dyn KeyValueStore>,
    pub pipeline: Arc<SubmissionPipeline>,
    pub fullscreen: Arc<dyn FullscreenControl>,
    pub presenter: Arc<dyn WarningPresenter>,
}

impl SessionDeps {
    /// Dependencies for a host without fullscreen support that logs warnings.
    pub fn new(store: Arc<dyn KeyValueStore>, pipeline: Arc<SubmissionPipeline>) -> Self {
        Self {
            store,
            pipeline,
            fullscreen: Arc::new(HeadlessFullscreen),
            presenter: Arc::new(LogPresenter),
        }
    }

    pub fn with_fullscreen(mut self, fullscreen: Arc<dyn FullscreenControl>) -> Self {
        self.fullscreen = fullscreen;
        self
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn WarningPresenter>) -> Self {
        self.presenter = presenter;
        self
    }
}

/// Mutable state of one exam attempt.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub student: StudentInfo,
    pub exam: ExamDefinition,
    pub current_index: usize,
    pub answers: Answers,
    pub time_left_seconds: u64,
    pub timing: SessionTiming,
    /// Flips to `true` exactly once, after the result has been finalized.
    pub submitted: bool,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            student: self.student.clone(),
            exam: self.exam.clone(),
            current_index: self.current_index,
            answers: self.answers.clone(),
            time_left_seconds: self.time_left_seconds,
            timing: self.timing.clone(),
        }
    }
}

impl From<SessionSnapshot> for SessionState {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            student: snapshot.student,
            exam: snapshot.exam,
            current_index: snapshot.current_index,
            answers: snapshot.answers,
            time_left_seconds: snapshot.time_left_seconds,
            timing: snapshot.timing,
            submitted: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Active,
    /// Submission started; a second submit is a no-op.
    Submitting,
    Submitted,
}

struct SessionInner {
    phase: Phase,
    state: Option<SessionState>,
    result: Option<ExamResult>,
    ticker_stop: Option<oneshot::Sender<()>>,
}

struct Shared {
    inner: Mutex<SessionInner>,
    monitor: ViolationMonitor,
    store: Arc<dyn KeyValueStore>,
    pipeline: Arc<SubmissionPipeline>,
    fullscreen: Arc<dyn FullscreenControl>,
    outcome: watch::Sender<Option<SubmissionOutcome>>,
    config: SessionConfig,
}

/// Drives one exam session at a time. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(deps: SessionDeps, config: SessionConfig) -> Self {
        let monitor = ViolationMonitor::new(Arc::clone(&deps.fullscreen), deps.presenter);
        let (outcome, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(SessionInner {
                    phase: Phase::Idle,
                    state: None,
                    result: None,
                    ticker_stop: None,
                }),
                monitor,
                store: deps.store,
                pipeline: deps.pipeline,
                fullscreen: deps.fullscreen,
                outcome,
                config,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin a fresh attempt of `exam` for `student`.
    pub async fn start_session(
        &self,
        exam: ExamDefinition,
        student: StudentInfo,
    ) -> Result<(), SessionError> {
        let minutes = exam
            .settings
            .duration_minutes
            .filter(|m| *m > 0)
            .ok_or_else(|| SessionError::MissingDuration(exam.id.clone()))?;
        if student.name.trim().is_empty() {
            return Err(SessionError::MissingStudentName);
        }
        self.ensure_not_running()?;

        self.enter_fullscreen_if_strict(&exam).await;

        let state = SessionState {
            student,
            exam,
            current_index: 0,
            answers: Answers::new(),
            time_left_seconds: u64::from(minutes) * 60,
            timing: SessionTiming {
                started_at: Utc::now(),
                submitted_at: None,
                duration_allowed_minutes: minutes,
            },
            submitted: false,
        };
        tracing::info!(
            exam = %state.exam.id,
            student = %state.student.name,
            seconds = state.time_left_seconds,
            "exam session started"
        );
        self.activate(state)
    }

    /// Resume from the persisted snapshot. Returns `false` when there is
    /// nothing usable to resume and a fresh session is required.
    pub async fn resume(&self) -> Result<bool, SessionError> {
        let raw = self
            .shared
            .store
            .get(&self.shared.config.snapshot_key)
            .map_err(SessionError::Persistence)?;
        match raw {
            Some(raw) => self.restore_snapshot(&raw).await,
            None => Ok(false),
        }
    }

    /// Resume from a serialized snapshot. A corrupted payload is erased from
    /// the store and reported as `Ok(false)`. A running session is never
    /// touched.
    pub async fn restore_snapshot(&self, raw: &str) -> Result<bool, SessionError> {
        self.ensure_not_running()?;
        let snapshot = match SessionSnapshot::restore(raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("discarding corrupted session snapshot: {e}");
                self.erase_snapshot();
                return Ok(false);
            }
        };
        self.enter_fullscreen_if_strict(&snapshot.exam).await;

        let state = SessionState::from(snapshot);
        tracing::info!(
            exam = %state.exam.id,
            student = %state.student.name,
            seconds = state.time_left_seconds,
            answered = state.answers.len(),
            "exam session resumed"
        );
        self.activate(state)?;
        Ok(true)
    }

    fn ensure_not_running(&self) -> Result<(), SessionError> {
        match self.lock().phase {
            Phase::Active | Phase::Submitting => Err(SessionError::AlreadyActive),
            Phase::Idle | Phase::Submitted => Ok(()),
        }
    }

    async fn enter_fullscreen_if_strict(&self, exam: &ExamDefinition) {
        if !exam.settings.strict_mode || !self.shared.fullscreen.is_supported() {
            return;
        }
        if let Err(e) = self
            .shared
            .fullscreen
            .request_fullscreen(&self.shared.config.container)
            .await
        {
            tracing::warn!("could not enter fullscreen: {e:#}");
        }
    }

    fn activate(&self, state: SessionState) -> Result<(), SessionError> {
        let settings = &state.exam.settings;
        self.shared.monitor.init(MonitorConfig {
            container: self.shared.config.container.clone(),
            auto_submit_on_violation: settings.auto_submit_on_violation,
            violation_threshold: settings.violation_threshold,
            enable_warnings: self.shared.config.enable_warnings,
            strict_mode: settings.strict_mode,
        })?;

        let weak = Arc::downgrade(&self.shared);
        let _auto_submit = self.shared.monitor.on_auto_submit(move |_| {
            let Some(shared) = weak.upgrade() else {
                return Ok(());
            };
            let controller = SessionController { shared };
            let runtime = tokio::runtime::Handle::try_current()
                .context("no async runtime to run the violation submission")?;
            runtime.spawn(async move {
                controller.submit(SubmissionType::AutoViolation).await;
            });
            Ok(())
        });

        self.shared.outcome.send_replace(None);
        let mut inner = self.lock();
        inner.phase = Phase::Active;
        inner.result = None;
        self.persist_locked(&state);
        inner.state = Some(state);
        Ok(())
    }

    /// Forward environment signals from `signals` to the session's monitor.
    pub fn attach_signals(&self, signals: mpsc::UnboundedReceiver<EnvironmentSignal>) {
        self.shared.monitor.subscribe(signals);
    }

    /// Spawn the once-per-second countdown. It stops by itself on submission.
    pub fn start_timer(&self) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime, countdown not started");
            return false;
        };
        let (stop_tx, mut stop_rx) = oneshot::channel();
        {
            let mut inner = self.lock();
            if inner.phase != Phase::Active {
                return false;
            }
            if let Some(previous) = inner.ticker_stop.replace(stop_tx) {
                let _ = previous.send(());
            }
        }

        let controller = self.clone();
        runtime.spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        if controller.tick().await.is_none() {
                            break;
                        }
                    }
                }
            }
        });
        true
    }

    /// Advance the countdown by one second. Returns the seconds left, or
    /// `None` when no session is running.
    pub async fn tick(&self) -> Option<u64> {
        let time_left = {
            let mut inner = self.lock();
            if inner.phase != Phase::Active {
                return None;
            }
            let state = inner.state.as_mut()?;
            state.time_left_seconds = state.time_left_seconds.saturating_sub(1);
            let left = state.time_left_seconds;
            let every = self.shared.config.persist_every_secs.max(1);
            if left > 0 && left % every == 0 {
                self.persist_locked(state);
            }
            left
        };

        if time_left == 0 {
            tracing::info!("time is up, submitting");
            self.submit(SubmissionType::AutoTimeout).await;
        }
        Some(time_left)
    }

    /// Select `option` for `question_id`. Ignored once submission has begun.
    pub fn record_answer(&self, question_id: &str, option: OptionKey) -> bool {
        self.update_active(|state| {
            state.answers.insert(question_id.to_string(), option);
        })
    }

    /// Withdraw the answer for `question_id`.
    pub fn clear_answer(&self, question_id: &str) -> bool {
        self.update_active(|state| {
            state.answers.remove(question_id);
        })
    }

    /// Move to question `index`, clamped to the exam. Returns the new index.
    pub fn navigate(&self, index: usize) -> Option<usize> {
        let mut position = None;
        self.update_active(|state| {
            let last = state.exam.questions.len().saturating_sub(1);
            state.current_index = index.min(last);
            position = Some(state.current_index);
        });
        position
    }

    fn update_active(&self, change: impl FnOnce(&mut SessionState)) -> bool {
        let mut inner = self.lock();
        if inner.phase != Phase::Active {
            return false;
        }
        let Some(state) = inner.state.as_mut() else {
            return false;
        };
        change(state);
        self.persist_locked(state);
        true
    }

    /// Persist the current state now.
    pub fn persist_snapshot(&self) -> Result<(), SessionError> {
        let inner = self.lock();
        if inner.phase != Phase::Active {
            return Err(SessionError::NoSession);
        }
        let state = inner.state.as_ref().ok_or(SessionError::NoSession)?;
        self.write_snapshot(state)
    }

    fn write_snapshot(&self, state: &SessionState) -> Result<(), SessionError> {
        let json = state
            .snapshot()
            .to_json()
            .map_err(|e| SessionError::Persistence(e.into()))?;
        self.shared
            .store
            .set(&self.shared.config.snapshot_key, &json)
            .map_err(SessionError::Persistence)
    }

    fn persist_locked(&self, state: &SessionState) {
        if let Err(e) = self.write_snapshot(state) {
            tracing::warn!("{e:#}");
        }
    }

    fn erase_snapshot(&self) {
        if let Err(e) = self.shared.store.delete(&self.shared.config.snapshot_key) {
            tracing::warn!("failed to erase session snapshot: {e:#}");
        }
    }

    /// Finish the session: score it, freeze the ledger, and hand the result
    /// to the pipeline. Only the first call does anything; later or
    /// concurrent calls return `None`.
    pub async fn submit(&self, kind: SubmissionType) -> Option<SubmissionOutcome> {
        let state = {
            let mut inner = self.lock();
            if inner.phase != Phase::Active {
                tracing::debug!(%kind, phase = ?inner.phase, "submit ignored");
                return None;
            }
            inner.phase = Phase::Submitting;
            if let Some(stop) = inner.ticker_stop.take() {
                let _ = stop.send(());
            }
            let state = inner.state.as_mut()?;
            state.timing.submitted_at = Some(Utc::now());
            state.clone()
        };

        self.erase_snapshot();

        let card = scoring::compute(&state.exam, &state.answers);
        let violations = self.shared.monitor.get_violations();
        self.shared.monitor.destroy();

        let allowed_secs = u64::from(state.timing.duration_allowed_minutes) * 60;
        let timing = ResultTiming {
            started_at: state.timing.started_at,
            submitted_at: state.timing.submitted_at.unwrap_or_else(Utc::now),
            duration_allowed_minutes: state.timing.duration_allowed_minutes,
            time_taken_seconds: i64::try_from(allowed_secs.saturating_sub(state.time_left_seconds))
                .unwrap_or(i64::MAX),
        };
        let result = ExamResult::new(
            state.student.clone(),
            &state.exam,
            card,
            timing,
            kind,
            violations,
        );
        tracing::info!(
            id = %result.submission_id,
            %kind,
            obtained = result.score.obtained_marks,
            total = result.score.total_marks,
            violations = result.integrity.violations,
            "exam submitted"
        );

        let outcome = self.shared.pipeline.finalize(&result).await;

        {
            let mut inner = self.lock();
            if let Some(state) = inner.state.as_mut() {
                state.submitted = true;
            }
            inner.phase = Phase::Submitted;
            inner.result = Some(result);
        }
        self.shared.outcome.send_replace(Some(outcome.clone()));
        Some(outcome)
    }

    /// Wait until the current session's submission has been finalized.
    pub async fn wait_for_outcome(&self) -> Option<SubmissionOutcome> {
        let mut rx = self.shared.outcome.subscribe();
        let outcome = rx.wait_for(Option::is_some).await.ok()?;
        outcome.clone()
    }

    pub fn is_submitted(&self) -> bool {
        self.lock().state.as_ref().is_some_and(|s| s.submitted)
    }

    /// A copy of the session state.
    pub fn state(&self) -> Option<SessionState> {
        self.lock().state.clone()
    }

    pub fn current_question(&self) -> Option<Question> {
        let inner = self.lock();
        let state = inner.state.as_ref()?;
        state.exam.questions.get(state.current_index).cloned()
    }

    /// The submitted result, once available.
    pub fn result(&self) -> Option<ExamResult> {
        self.lock().result.clone()
    }

    pub fn outcome(&self) -> Option<SubmissionOutcome> {
        self.shared.outcome.borrow().clone()
    }

    pub fn monitor(&self) -> &ViolationMonitor {
        &self.shared.monitor
    }
}
