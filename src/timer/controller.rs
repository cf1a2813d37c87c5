use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    db::{Database, FinalizedSession, FinalizedTask, NewSession},
    error::TrackingError,
    models::{Session, Subtask},
    planning::SessionPlan,
    report::Report,
    sensing::{sample_with_timeout, ActivitySampler},
    settings::TrackingSettings,
};

use super::state::{ClockState, DisplayUpdate, SwitchOutcome, Tick, TimerStatus, TrackingSession};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

type SharedSession = Arc<Mutex<Option<TrackingSession>>>;
type UpdateSender = Arc<watch::Sender<Option<DisplayUpdate>>>;

struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Owns the one tracking session, its ticker task and the display channel.
///
/// Every command and every tick takes the same lock, so a task switch is
/// always observed whole by the next tick.
#[derive(Clone)]
pub struct TimerController {
    state: SharedSession,
    db: Database,
    sampler: Arc<dyn ActivitySampler>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    settings: TrackingSettings,
    updates: UpdateSender,
}

impl TimerController {
    pub fn new(db: Database, sampler: Arc<dyn ActivitySampler>, settings: TrackingSettings) -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            state: Arc::new(Mutex::new(None)),
            db,
            sampler,
            ticker: Arc::new(Mutex::new(None)),
            settings,
            updates: Arc::new(updates),
        }
    }

    /// Latest display state. Slow consumers only ever see the newest value.
    pub fn subscribe(&self) -> watch::Receiver<Option<DisplayUpdate>> {
        self.updates.subscribe()
    }

    pub async fn snapshot(&self) -> Option<DisplayUpdate> {
        self.state.lock().await.as_ref().map(TrackingSession::display)
    }

    pub async fn clock_state(&self) -> Option<ClockState> {
        self.state.lock().await.as_ref().map(|tracking| tracking.clock().clone())
    }

    pub async fn session(&self) -> Option<Session> {
        self.state
            .lock()
            .await
            .as_ref()
            .map(|tracking| tracking.session().clone())
    }

    pub async fn is_tracking(&self) -> bool {
        self.state
            .lock()
            .await
            .as_ref()
            .is_some_and(|tracking| tracking.clock().is_tracking())
    }

    pub async fn start_session(&self, plan: &SessionPlan) -> Result<DisplayUpdate> {
        let display = {
            let mut state = self.state.lock().await;
            if state
                .as_ref()
                .is_some_and(|tracking| tracking.clock().is_tracking())
            {
                return Err(TrackingError::AlreadyActive.into());
            }

            let started_at = Utc::now();
            let session_id = self
                .db
                .insert_session(&NewSession {
                    planned_total_minutes: plan.planned_total_minutes(),
                    planned_end: plan.planned_end(),
                    started_at,
                })
                .await
                .context("failed to record session start")?;

            let session = Session {
                id: session_id,
                planned_total_minutes: plan.planned_total_minutes(),
                planned_end: plan.planned_end(),
                started_at,
                ended_at: None,
                tasks: plan.to_tasks(),
            };

            let tracking = TrackingSession::start(session, self.settings.sample_every_ticks);
            let display = tracking.display();
            *state = Some(tracking);

            log_info!(
                "Started session {} with {} tasks ({:.1} minutes planned)",
                session_id,
                plan.tasks().len(),
                plan.planned_total_minutes()
            );
            display
        };

        self.spawn_ticker().await;
        self.updates.send_replace(Some(display.clone()));

        Ok(display)
    }

    pub async fn pause(&self) -> Result<bool, TrackingError> {
        self.update(TrackingSession::pause).await
    }

    pub async fn resume(&self) -> Result<bool, TrackingError> {
        self.update(TrackingSession::resume).await
    }

    /// Returns whether the clock is running afterwards.
    pub async fn toggle_pause(&self) -> Result<bool, TrackingError> {
        self.update(TrackingSession::toggle_pause).await
    }

    pub async fn switch_to(&self, index: usize) -> Result<SwitchOutcome, TrackingError> {
        Ok(self.update(|tracking| tracking.switch_to(index)).await??)
    }

    pub async fn next_task(&self) -> Result<SwitchOutcome, TrackingError> {
        Ok(self.update(TrackingSession::next_task).await??)
    }

    pub async fn previous_task(&self) -> Result<SwitchOutcome, TrackingError> {
        Ok(self.update(TrackingSession::previous_task).await??)
    }

    pub async fn add_subtask(&self, name: &str) -> Result<bool, TrackingError> {
        self.update(|tracking| tracking.add_subtask(name)).await
    }

    pub async fn toggle_subtask(&self, index: usize) -> Result<Option<bool>, TrackingError> {
        self.update(|tracking| tracking.toggle_subtask(index)).await
    }

    pub async fn remove_subtask(&self, index: usize) -> Result<Option<Subtask>, TrackingError> {
        self.update(|tracking| tracking.remove_subtask(index)).await
    }

    /// Current report without touching storage.
    pub async fn report(&self) -> Result<Report, TrackingError> {
        let state = self.state.lock().await;
        let tracking = state.as_ref().ok_or(TrackingError::NoSession)?;
        Ok(tracking.finalize(&self.settings.report_options()))
    }

    /// Build the report and hand it, with the per-task results, to storage.
    /// Tracking continues; call `end_session` to stop.
    pub async fn generate_report(&self) -> Result<Report> {
        let (report, finalized) = {
            let mut state = self.state.lock().await;
            let tracking = state.as_mut().ok_or(TrackingError::NoSession)?;

            let report = tracking.finalize(&self.settings.report_options());
            let ended_at = Utc::now();
            tracking.mark_ended(ended_at);
            let finalized = finalized_session(tracking, &report, ended_at)?;
            (report, finalized)
        };

        self.db
            .save_finalized_session(&finalized)
            .await
            .with_context(|| format!("failed to store report for session {}", report.session_id))?;

        if let Some(tracking) = self
            .state
            .lock()
            .await
            .as_mut()
            .filter(|tracking| tracking.session_id() == report.session_id)
        {
            tracking.mark_report_stored();
        }

        log_info!(
            "Stored report for session {} ({:.1} of {:.1} minutes tracked)",
            report.session_id,
            report.total_actual_minutes,
            report.planned_total_minutes
        );

        Ok(report)
    }

    /// Stop the clock for good and store the final report.
    ///
    /// If an earlier call stopped the clock but failed to store the report,
    /// calling again retries the store.
    pub async fn end_session(&self) -> Result<Report> {
        let already_stopped = {
            let mut state = self.state.lock().await;
            let tracking = state.as_mut().ok_or(TrackingError::NoSession)?;
            let stopped = tracking.clock().status == TimerStatus::Stopped;
            if stopped && tracking.report_stored() {
                return Err(TrackingError::SessionEnded.into());
            }
            if !stopped {
                tracking.stop();
                self.updates.send_replace(Some(tracking.display()));
            }
            stopped
        };

        if already_stopped {
            log_warn!("Retrying report storage for a stopped session");
        } else {
            self.cancel_ticker().await;
        }

        self.generate_report().await
    }

    /// Stop and forget the current session without writing a report.
    pub async fn discard_session(&self) -> Result<(), TrackingError> {
        let (session_id, already_ended) = {
            let mut state = self.state.lock().await;
            let mut tracking = state.take().ok_or(TrackingError::NoSession)?;
            let already_ended = tracking.report_stored();
            tracking.stop();
            (tracking.session_id(), already_ended)
        };
        self.cancel_ticker().await;
        self.updates.send_replace(None);

        if !already_ended {
            if let Err(err) = self.db.mark_session_ended(session_id, Utc::now()).await {
                log_error!("failed to close discarded session {}: {err:#}", session_id);
            }
        }
        log_info!("Discarded session {}", session_id);
        Ok(())
    }

    async fn update<T>(
        &self,
        mutate: impl FnOnce(&mut TrackingSession) -> T,
    ) -> Result<T, TrackingError> {
        let mut state = self.state.lock().await;
        let tracking = state.as_mut().ok_or(TrackingError::NoSession)?;
        let result = mutate(tracking);
        self.updates.send_replace(Some(tracking.display()));
        Ok(result)
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(previous) = ticker_guard.take() {
            previous.cancel.cancel();
            previous.handle.abort();
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(
            self.state.clone(),
            self.sampler.clone(),
            self.updates.clone(),
            self.settings.clone(),
            cancel.clone(),
        ));

        *ticker_guard = Some(Ticker { handle, cancel });
    }

    async fn cancel_ticker(&self) {
        let ticker = self.ticker.lock().await.take();
        if let Some(ticker) = ticker {
            ticker.cancel.cancel();
            if let Err(err) = ticker.handle.await {
                if !err.is_cancelled() {
                    log_error!("ticker task failed: {err}");
                }
            }
        }
    }
}

async fn tick_loop(
    state: SharedSession,
    sampler: Arc<dyn ActivitySampler>,
    updates: UpdateSender,
    settings: TrackingSettings,
    cancel: CancellationToken,
) {
    let period = settings.tick_interval();
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log_debug!("ticker cancelled");
                break;
            }
            _ = interval.tick() => {
                let (session_id, tick, display) = {
                    let mut guard = state.lock().await;
                    let Some(tracking) = guard.as_mut() else {
                        break;
                    };
                    if tracking.clock().status == TimerStatus::Stopped {
                        break;
                    }
                    let tick = tracking.tick();
                    (tracking.session_id(), tick, tracking.display())
                };

                match tick {
                    Tick::Idle => continue,
                    Tick::Advanced => {}
                    Tick::SampleDue(task_name) => {
                        tokio::spawn(record_activity(
                            state.clone(),
                            sampler.clone(),
                            session_id,
                            task_name,
                            settings.sample_timeout(),
                        ));
                    }
                }

                updates.send_replace(Some(display));
            }
        }
    }
}

async fn record_activity(
    state: SharedSession,
    sampler: Arc<dyn ActivitySampler>,
    session_id: i64,
    task_name: String,
    timeout: Duration,
) {
    let timestamp = Utc::now();

    match sample_with_timeout(sampler, timeout).await {
        Ok(Some(label)) => {
            let mut guard = state.lock().await;
            let recorded = guard
                .as_mut()
                .filter(|tracking| tracking.session_id() == session_id)
                .is_some_and(|tracking| tracking.record_sample(&task_name, label, timestamp));
            if !recorded {
                log_debug!("dropped activity sample for finished session {}", session_id);
            }
        }
        Ok(None) => log_debug!("no focused window for task '{}'", task_name),
        Err(err) => log_warn!("activity sample failed for task '{}': {err:#}", task_name),
    }
}

fn finalized_session(
    tracking: &TrackingSession,
    report: &Report,
    ended_at: DateTime<Utc>,
) -> Result<FinalizedSession> {
    let tasks = tracking
        .session()
        .tasks
        .iter()
        .zip(&report.tasks)
        .map(|(task, task_report)| {
            let activity_json = serde_json::to_string(tracking.activity().samples_for(&task.name))
                .with_context(|| format!("failed to serialize activity for '{}'", task.name))?;
            Ok(FinalizedTask {
                name: task.name.clone(),
                planned_minutes: task.planned_minutes,
                actual_seconds: task_report.actual_seconds,
                completed: task_report.completed,
                activity_json,
                subtasks: task.subtasks.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FinalizedSession {
        session_id: tracking.session_id(),
        ended_at,
        report_date: ended_at.with_timezone(&Local).date_naive(),
        tasks,
        report: report.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::TaskDraft;
    use crate::report::TaskStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn fast_settings() -> TrackingSettings {
        TrackingSettings {
            tick_interval_ms: 5,
            sample_every_ticks: 2,
            sample_timeout_ms: 500,
            ..TrackingSettings::default()
        }
    }

    fn plan() -> SessionPlan {
        SessionPlan::new(
            vec![TaskDraft::new("Write", 30), TaskDraft::new("Review", 45)],
            75.0,
        )
        .unwrap()
    }

    fn controller(dir: &TempDir, sampler: Arc<dyn ActivitySampler>) -> TimerController {
        let db = Database::new(dir.path().join("taskclock.sqlite3")).unwrap();
        TimerController::new(db, sampler, fast_settings())
    }

    fn editor_sampler() -> Arc<dyn ActivitySampler> {
        Arc::new(|| -> Result<Option<String>> { Ok(Some("Editor".to_string())) })
    }

    async fn wait_for_elapsed(controller: &TimerController, at_least: u64) -> u64 {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let elapsed = controller.snapshot().await.map(|d| d.elapsed_seconds).unwrap_or(0);
            if elapsed >= at_least || Instant::now() > deadline {
                return elapsed;
            }
            time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_start_rejects_second_active_session() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, editor_sampler());

        let display = controller.start_session(&plan()).await.unwrap();
        assert_eq!(display.task_name, "Write");
        assert!(display.is_running);
        assert!(controller.is_tracking().await);

        let err = controller.start_session(&plan()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackingError>(),
            Some(&TrackingError::AlreadyActive)
        );

        controller.end_session().await.unwrap();
        controller.start_session(&plan()).await.unwrap();
        controller.discard_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_without_session() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, editor_sampler());

        assert_eq!(controller.pause().await, Err(TrackingError::NoSession));
        assert_eq!(controller.next_task().await, Err(TrackingError::NoSession));
        assert!(controller.snapshot().await.is_none());
        assert!(controller.end_session().await.is_err());
    }

    #[tokio::test]
    async fn test_clock_advances_and_pause_freezes_it() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, editor_sampler());
        controller.start_session(&plan()).await.unwrap();

        assert!(wait_for_elapsed(&controller, 3).await >= 3);

        assert_eq!(controller.pause().await, Ok(true));
        let frozen = controller.clock_state().await.unwrap();
        time::sleep(Duration::from_millis(40)).await;
        let later = controller.clock_state().await.unwrap();
        assert_eq!(frozen.elapsed_seconds, later.elapsed_seconds);
        assert_eq!(later.status, TimerStatus::Paused);

        assert_eq!(controller.toggle_pause().await, Ok(true));
        assert!(wait_for_elapsed(&controller, later.elapsed_seconds + 2).await > later.elapsed_seconds);

        controller.discard_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_switch_moves_time_between_tasks() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, editor_sampler());
        controller.start_session(&plan()).await.unwrap();
        wait_for_elapsed(&controller, 2).await;

        controller.pause().await.unwrap();
        let before = controller.clock_state().await.unwrap().elapsed_seconds;

        assert_eq!(
            controller.switch_to(1).await,
            Ok(SwitchOutcome::Switched { from: 0, to: 1 })
        );
        let session = controller.session().await.unwrap();
        assert_eq!(session.tasks[0].stored_elapsed_seconds, before);
        assert_eq!(controller.clock_state().await.unwrap().elapsed_seconds, 0);

        controller.previous_task().await.unwrap();
        assert_eq!(controller.clock_state().await.unwrap().elapsed_seconds, before);

        controller.discard_session().await.unwrap();
        assert_eq!(controller.switch_to(1).await, Err(TrackingError::NoSession));
    }

    #[tokio::test]
    async fn test_updates_are_published() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, editor_sampler());
        let mut updates = controller.subscribe();

        controller.start_session(&plan()).await.unwrap();
        time::timeout(Duration::from_secs(2), updates.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(updates.borrow_and_update().is_some());

        controller.discard_session().await.unwrap();
        time::timeout(Duration::from_secs(2), updates.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(updates.borrow().is_none());
    }

    #[tokio::test]
    async fn test_end_session_stores_report_with_activity() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, editor_sampler());
        controller.start_session(&plan()).await.unwrap();
        controller.add_subtask("outline").await.unwrap();
        controller.toggle_subtask(0).await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.report().await.unwrap().tasks[0].top_activities.is_empty()
            && Instant::now() < deadline
        {
            time::sleep(Duration::from_millis(5)).await;
        }

        let report = controller.end_session().await.unwrap();
        assert_eq!(report.tasks[0].top_activities[0].label, "Editor");
        assert_eq!(report.tasks[0].subtasks_completed, 1);
        assert_eq!(report.tasks[1].status, TaskStatus::OnTrack);

        // stopped: further ticks change nothing and the report is stable
        time::sleep(Duration::from_millis(30)).await;
        assert_eq!(controller.report().await.unwrap(), report);
        assert_eq!(
            controller.clock_state().await.unwrap().status,
            TimerStatus::Stopped
        );

        let tasks = controller.db.get_session_tasks(report.session_id).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].completed);
        assert!(!tasks[1].completed);
        assert!(tasks[0].activity_json.contains("Editor"));
        assert_eq!(tasks[0].subtasks[0].name, "outline");
        assert_eq!(controller.db.list_reports(5).await.unwrap().len(), 1);

        let err = controller.end_session().await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackingError>(),
            Some(&TrackingError::SessionEnded)
        );
    }

    #[tokio::test]
    async fn test_end_session_retries_a_failed_store() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir, editor_sampler());
        let display = controller.start_session(&plan()).await.unwrap();
        assert_eq!(display.task_index, 0);
        let session_id = controller.session().await.unwrap().id;

        // hide the session row so the store fails
        controller
            .db
            .execute(move |conn| {
                conn.execute(
                    "UPDATE sessions SET id = id + 1000 WHERE id = ?1",
                    rusqlite::params![session_id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(controller.end_session().await.is_err());
        assert_eq!(
            controller.clock_state().await.unwrap().status,
            TimerStatus::Stopped
        );
        assert!(controller.db.list_reports(5).await.unwrap().is_empty());

        controller
            .db
            .execute(move |conn| {
                conn.execute(
                    "UPDATE sessions SET id = ?1 WHERE id = ?1 + 1000",
                    rusqlite::params![session_id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let report = controller.end_session().await.unwrap();
        assert_eq!(report.session_id, session_id);
        let history = controller.db.list_reports(5).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].session_id, session_id);

        let err = controller.end_session().await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackingError>(),
            Some(&TrackingError::SessionEnded)
        );
    }

    #[tokio::test]
    async fn test_sampler_failures_do_not_stop_the_clock() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sampler: Arc<dyn ActivitySampler> = Arc::new(move || -> Result<Option<String>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("display unavailable"))
        });
        let controller = controller(&dir, sampler);
        controller.start_session(&plan()).await.unwrap();

        assert!(wait_for_elapsed(&controller, 8).await >= 8);
        let deadline = Instant::now() + Duration::from_secs(5);
        while calls.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            time::sleep(Duration::from_millis(5)).await;
        }
        assert!(calls.load(Ordering::SeqCst) >= 1);

        let report = controller.report().await.unwrap();
        assert!(report.tasks[0].top_activities.is_empty());
        controller.discard_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_report_twice_keeps_one_stored_report() {
        let dir = TempDir::new().unwrap();
        let sampler: Arc<dyn ActivitySampler> = Arc::new(|| -> Result<Option<String>> { Ok(None) });
        let controller = controller(&dir, sampler);
        controller.start_session(&plan()).await.unwrap();
        controller.pause().await.unwrap();

        let first = controller.generate_report().await.unwrap();
        let second = controller.generate_report().await.unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        assert!(controller.is_tracking().await);
        let session = controller.db.get_session(first.session_id).await.unwrap().unwrap();
        assert!(session.ended_at.is_some());
        assert_eq!(controller.db.list_reports(5).await.unwrap().len(), 1);

        controller.end_session().await.unwrap();
    }
}
