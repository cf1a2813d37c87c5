use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub name: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub name: String,
    pub planned_minutes: u32,
    /// Seconds accrued during earlier visits. Only written when the task is
    /// switched away from; the active task's live time sits on the clock.
    pub stored_elapsed_seconds: u64,
    pub subtasks: Vec<Subtask>,
}

impl Task {
    pub fn new(name: impl Into<String>, planned_minutes: u32) -> Self {
        Self {
            name: name.into(),
            planned_minutes,
            stored_elapsed_seconds: 0,
            subtasks: Vec::new(),
        }
    }

    pub fn planned_seconds(&self) -> u64 {
        u64::from(self.planned_minutes) * 60
    }

    pub fn completed_subtasks(&self) -> usize {
        self.subtasks.iter().filter(|subtask| subtask.completed).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: i64,
    pub planned_total_minutes: f64,
    pub planned_end: Option<NaiveDateTime>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub tasks: Vec<Task>,
}
