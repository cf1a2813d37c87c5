use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::Task;

/// A task as entered during setup, before validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub name: String,
    pub planned_minutes: i64,
}

impl TaskDraft {
    pub fn new(name: impl Into<String>, planned_minutes: i64) -> Self {
        Self {
            name: name.into(),
            planned_minutes,
        }
    }
}

/// Advisory raised when the task minutes do not add up to the session length.
/// The caller decides whether to proceed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MismatchWarning {
    pub session_minutes: i64,
    pub task_minutes: i64,
    pub difference: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlanCheck {
    Balanced,
    Mismatch(MismatchWarning),
}

/// Check a task list against the session's total planned minutes.
pub fn validate(
    tasks: &[TaskDraft],
    total_planned_minutes: f64,
) -> Result<PlanCheck, ValidationError> {
    if !(total_planned_minutes > 0.0) {
        return Err(ValidationError::EndTimeNotInFuture {
            total_minutes: total_planned_minutes,
        });
    }

    if tasks.is_empty() {
        return Err(ValidationError::NoTasks);
    }

    let mut seen = HashSet::new();
    for (position, task) in tasks.iter().enumerate() {
        let name = task.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyTaskName {
                position: position + 1,
            });
        }
        if task.planned_minutes <= 0 {
            return Err(ValidationError::NonPositiveMinutes {
                name: name.to_string(),
            });
        }
        if task.planned_minutes > i64::from(u32::MAX) {
            return Err(ValidationError::MinutesTooLarge {
                name: name.to_string(),
                minutes: task.planned_minutes,
            });
        }
        if !seen.insert(name) {
            return Err(ValidationError::DuplicateTaskName {
                name: name.to_string(),
            });
        }
    }

    let session_minutes = total_planned_minutes.floor() as i64;
    let task_minutes: i64 = tasks.iter().map(|task| task.planned_minutes).sum();

    if session_minutes == task_minutes {
        Ok(PlanCheck::Balanced)
    } else {
        Ok(PlanCheck::Mismatch(MismatchWarning {
            session_minutes,
            task_minutes,
            difference: (session_minutes - task_minutes).abs(),
        }))
    }
}

/// A validated, ready-to-track session plan.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    tasks: Vec<TaskDraft>,
    planned_total_minutes: f64,
    planned_end: Option<NaiveDateTime>,
    check: PlanCheck,
}

impl SessionPlan {
    pub fn new(tasks: Vec<TaskDraft>, planned_total_minutes: f64) -> Result<Self, ValidationError> {
        let check = validate(&tasks, planned_total_minutes)?;
        let tasks = tasks
            .into_iter()
            .map(|task| TaskDraft {
                name: task.name.trim().to_string(),
                planned_minutes: task.planned_minutes,
            })
            .collect();

        Ok(Self {
            tasks,
            planned_total_minutes,
            planned_end: None,
            check,
        })
    }

    /// Plan a session that runs from `now` until `end`.
    pub fn until(
        tasks: Vec<TaskDraft>,
        end: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<Self, ValidationError> {
        let total_minutes = (end - now).num_milliseconds() as f64 / 60_000.0;
        let mut plan = Self::new(tasks, total_minutes)?;
        plan.planned_end = Some(end);
        Ok(plan)
    }

    pub fn tasks(&self) -> &[TaskDraft] {
        &self.tasks
    }

    pub fn planned_total_minutes(&self) -> f64 {
        self.planned_total_minutes
    }

    pub fn planned_end(&self) -> Option<NaiveDateTime> {
        self.planned_end
    }

    pub fn check(&self) -> PlanCheck {
        self.check
    }

    pub fn mismatch(&self) -> Option<MismatchWarning> {
        match self.check {
            PlanCheck::Balanced => None,
            PlanCheck::Mismatch(warning) => Some(warning),
        }
    }

    /// Fresh tasks with no tracked time.
    pub fn to_tasks(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .filter_map(|draft| {
                // validate() keeps planned_minutes within 1..=u32::MAX
                let minutes = u32::try_from(draft.planned_minutes).ok()?;
                Some(Task::new(draft.name.clone(), minutes))
            })
            .collect()
    }
}
