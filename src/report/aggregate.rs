//! Planned vs. actual reconciliation for a tracked session.

use serde::{Deserialize, Serialize};

use crate::models::{ActivityLog, Session, Subtask};
use crate::timer::ClockState;

use super::activity::{summarize_activity, ActivityCount};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Completed,
    Exceeded,
    OnTrack,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Completed => "Completed",
            TaskStatus::Exceeded => "Exceeded",
            TaskStatus::OnTrack => "On Track",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReportOptions {
    pub label_max_chars: usize,
    pub top_activity_count: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            label_max_chars: 60,
            top_activity_count: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub index: usize,
    pub name: String,
    pub planned_minutes: u32,
    pub actual_seconds: u64,
    pub actual_minutes: f64,
    pub progress_percent: f64,
    pub difference_minutes: f64,
    pub status: TaskStatus,
    /// Worked on at some point: at or before the active task.
    pub completed: bool,
    pub top_activities: Vec<ActivityCount>,
    pub subtasks: Vec<Subtask>,
    pub subtasks_completed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub session_id: i64,
    pub planned_total_minutes: f64,
    pub task_count: usize,
    pub tasks_worked_on: usize,
    pub active_task_index: usize,
    pub total_actual_seconds: u64,
    pub total_actual_minutes: f64,
    pub tasks: Vec<TaskReport>,
}

/// Build the report. Pure: neither the session nor the clock is modified.
pub fn build_report(
    session: &Session,
    clock: &ClockState,
    activity: &ActivityLog,
    options: &ReportOptions,
) -> Report {
    let active = clock.active_task_index;

    let tasks: Vec<TaskReport> = session
        .tasks
        .iter()
        .enumerate()
        .map(|(index, task)| {
            let actual_seconds = if index == active {
                clock.elapsed_seconds
            } else {
                task.stored_elapsed_seconds
            };
            let actual_minutes = actual_seconds as f64 / 60.0;
            let planned_minutes = f64::from(task.planned_minutes);
            let progress_percent = if task.planned_minutes > 0 {
                actual_minutes / planned_minutes * 100.0
            } else {
                0.0
            };

            let status = if index < active {
                TaskStatus::Completed
            } else if progress_percent > 100.0 {
                TaskStatus::Exceeded
            } else {
                TaskStatus::OnTrack
            };

            TaskReport {
                index,
                name: task.name.clone(),
                planned_minutes: task.planned_minutes,
                actual_seconds,
                actual_minutes,
                progress_percent,
                difference_minutes: actual_minutes - planned_minutes,
                status,
                completed: index <= active,
                top_activities: summarize_activity(
                    activity.samples_for(&task.name),
                    options.label_max_chars,
                    options.top_activity_count,
                ),
                subtasks: task.subtasks.clone(),
                subtasks_completed: task.completed_subtasks(),
            }
        })
        .collect();

    let total_actual_seconds = tasks.iter().map(|task| task.actual_seconds).sum();
    let total_actual_minutes = tasks.iter().map(|task| task.actual_minutes).sum();

    Report {
        session_id: session.id,
        planned_total_minutes: session.planned_total_minutes,
        task_count: session.tasks.len(),
        tasks_worked_on: active + 1,
        active_task_index: active,
        total_actual_seconds,
        total_actual_minutes,
        tasks,
    }
}
