use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SwitchError;
use crate::models::{ActivityLog, ActivitySample, Session, Subtask};
use crate::report::{build_report, Report, ReportOptions};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl Default for TimerStatus {
    fn default() -> Self {
        TimerStatus::Idle
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClockState {
    pub status: TimerStatus,
    /// Seconds accrued toward the active task, including its earlier visits.
    pub elapsed_seconds: u64,
    pub active_task_index: usize,
}

impl ClockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Running or paused: the session is live and tasks may be switched.
    pub fn is_tracking(&self) -> bool {
        matches!(self.status, TimerStatus::Running | TimerStatus::Paused)
    }

    fn start(&mut self) {
        *self = Self {
            status: TimerStatus::Running,
            elapsed_seconds: 0,
            active_task_index: 0,
        };
    }
}

/// Result of one clock tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// Paused or stopped; nothing accrued.
    Idle,
    Advanced,
    /// Advanced, and an activity sample is due for the named task.
    SampleDue(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    Unchanged,
    Switched { from: usize, to: usize },
}

/// What the presentation side needs to draw the timer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayUpdate {
    pub task_index: usize,
    pub task_count: usize,
    pub task_name: String,
    pub planned_minutes: u32,
    pub elapsed_seconds: u64,
    pub remaining_seconds: i64,
    pub exceeded: bool,
    /// Alternates every second once the task has run over.
    pub flash: bool,
    pub is_running: bool,
    pub status: TimerStatus,
}

impl DisplayUpdate {
    pub fn timer_text(&self) -> String {
        let hours = self.elapsed_seconds / 3600;
        let minutes = (self.elapsed_seconds % 3600) / 60;
        let seconds = self.elapsed_seconds % 60;
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }

    pub fn remaining_text(&self) -> String {
        if self.exceeded {
            "Time exceeded!".to_string()
        } else {
            format!(
                "{}m {}s left",
                self.remaining_seconds / 60,
                self.remaining_seconds % 60
            )
        }
    }
}

/// One session's tasks, clock and activity samples.
///
/// All mutation goes through `&mut self`, so the controller's single lock is
/// enough to keep a switch and a tick from interleaving.
#[derive(Debug, Clone)]
pub struct TrackingSession {
    session: Session,
    clock: ClockState,
    activity: ActivityLog,
    sample_every_ticks: u64,
    report_stored: bool,
}

impl TrackingSession {
    /// Begin tracking. The caller guarantees `session.tasks` is non-empty.
    pub fn start(session: Session, sample_every_ticks: u32) -> Self {
        debug_assert!(!session.tasks.is_empty(), "cannot track a session without tasks");

        let mut clock = ClockState::new();
        clock.start();

        Self {
            session,
            clock,
            activity: ActivityLog::new(),
            sample_every_ticks: u64::from(sample_every_ticks.max(1)),
            report_stored: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn clock(&self) -> &ClockState {
        &self.clock
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn session_id(&self) -> i64 {
        self.session.id
    }

    pub fn active_task_name(&self) -> &str {
        &self.session.tasks[self.clock.active_task_index].name
    }

    pub fn tick(&mut self) -> Tick {
        if !self.clock.is_running() {
            return Tick::Idle;
        }

        self.clock.elapsed_seconds += 1;

        if self.clock.elapsed_seconds % self.sample_every_ticks == 0 {
            Tick::SampleDue(self.active_task_name().to_string())
        } else {
            Tick::Advanced
        }
    }

    /// Store a sample for `task_name`. Dropped once the session has stopped.
    pub fn record_sample(&mut self, task_name: &str, label: String, timestamp: DateTime<Utc>) -> bool {
        if self.clock.status == TimerStatus::Stopped {
            return false;
        }
        self.activity
            .append(task_name, ActivitySample { label, timestamp });
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.clock.status != TimerStatus::Running {
            return false;
        }
        self.clock.status = TimerStatus::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.clock.status != TimerStatus::Paused {
            return false;
        }
        self.clock.status = TimerStatus::Running;
        true
    }

    /// Returns the new running flag.
    pub fn toggle_pause(&mut self) -> bool {
        if !self.pause() {
            self.resume();
        }
        self.clock.is_running()
    }

    pub fn stop(&mut self) {
        self.clock.status = TimerStatus::Stopped;
    }

    pub fn mark_ended(&mut self, ended_at: DateTime<Utc>) {
        self.session.ended_at = Some(ended_at);
    }

    /// Set once storage has accepted a report for this session.
    pub fn mark_report_stored(&mut self) {
        self.report_stored = true;
    }

    pub fn report_stored(&self) -> bool {
        self.report_stored
    }

    /// Move the live counter onto the outgoing task and resume the incoming one.
    pub fn switch_to(&mut self, new_index: usize) -> Result<SwitchOutcome, SwitchError> {
        if !self.clock.is_tracking() {
            return Err(SwitchError::NotTracking);
        }

        let task_count = self.session.tasks.len();
        debug_assert!(
            new_index < task_count,
            "switch target {new_index} out of range for {task_count} tasks"
        );
        if new_index >= task_count {
            return Err(SwitchError::IndexOutOfRange {
                index: new_index,
                task_count,
            });
        }

        let current = self.clock.active_task_index;
        if new_index == current {
            return Ok(SwitchOutcome::Unchanged);
        }

        self.session.tasks[current].stored_elapsed_seconds = self.clock.elapsed_seconds;
        self.clock.active_task_index = new_index;
        self.clock.elapsed_seconds = self.session.tasks[new_index].stored_elapsed_seconds;

        Ok(SwitchOutcome::Switched {
            from: current,
            to: new_index,
        })
    }

    pub fn next_task(&mut self) -> Result<SwitchOutcome, SwitchError> {
        let count = self.session.tasks.len();
        if count < 2 {
            return Ok(SwitchOutcome::Unchanged);
        }
        self.switch_to((self.clock.active_task_index + 1) % count)
    }

    pub fn previous_task(&mut self) -> Result<SwitchOutcome, SwitchError> {
        let count = self.session.tasks.len();
        if count < 2 {
            return Ok(SwitchOutcome::Unchanged);
        }
        self.switch_to((self.clock.active_task_index + count - 1) % count)
    }

    pub fn add_subtask(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let index = self.clock.active_task_index;
        self.session.tasks[index].subtasks.push(Subtask {
            name: name.to_string(),
            completed: false,
        });
        true
    }

    /// Flip a subtask of the active task. Returns its new state.
    pub fn toggle_subtask(&mut self, subtask_index: usize) -> Option<bool> {
        let index = self.clock.active_task_index;
        let subtask = self.session.tasks[index].subtasks.get_mut(subtask_index)?;
        subtask.completed = !subtask.completed;
        Some(subtask.completed)
    }

    pub fn remove_subtask(&mut self, subtask_index: usize) -> Option<Subtask> {
        let subtasks = &mut self.session.tasks[self.clock.active_task_index].subtasks;
        (subtask_index < subtasks.len()).then(|| subtasks.remove(subtask_index))
    }

    pub fn display(&self) -> DisplayUpdate {
        let index = self.clock.active_task_index;
        let task = &self.session.tasks[index];
        let elapsed = self.clock.elapsed_seconds;
        let remaining = task.planned_seconds() as i64 - elapsed as i64;
        let exceeded = remaining <= 0;

        DisplayUpdate {
            task_index: index,
            task_count: self.session.tasks.len(),
            task_name: task.name.clone(),
            planned_minutes: task.planned_minutes,
            elapsed_seconds: elapsed,
            remaining_seconds: remaining,
            exceeded,
            flash: exceeded && elapsed % 2 == 0,
            is_running: self.clock.is_running(),
            status: self.clock.status,
        }
    }

    /// Read-only snapshot of planned vs. actual time.
    pub fn finalize(&self, options: &ReportOptions) -> Report {
        build_report(&self.session, &self.clock, &self.activity, options)
    }
}
