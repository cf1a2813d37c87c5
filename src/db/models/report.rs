//! Finalized session data and stored report documents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Subtask;
use crate::report::Report;

/// Per-task tuple handed to the store when a report is generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedTask {
    pub name: String,
    pub planned_minutes: u32,
    pub actual_seconds: u64,
    pub completed: bool,
    /// Activity samples serialised as a JSON array.
    pub activity_json: String,
    pub subtasks: Vec<Subtask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedSession {
    pub session_id: i64,
    pub ended_at: DateTime<Utc>,
    pub report_date: NaiveDate,
    pub tasks: Vec<FinalizedTask>,
    pub report: Report,
}

impl FinalizedSession {
    pub fn total_planned_minutes(&self) -> f64 {
        self.report.planned_total_minutes
    }

    pub fn total_actual_minutes(&self) -> f64 {
        self.report.total_actual_minutes
    }
}

/// A `session_tasks` row with its subtasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTask {
    pub id: i64,
    pub session_id: i64,
    pub position: usize,
    pub name: String,
    pub planned_minutes: u32,
    pub actual_seconds: u64,
    pub completed: bool,
    pub activity_json: String,
    pub subtasks: Vec<Subtask>,
}

/// One line of report history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: i64,
    pub session_id: i64,
    pub report_date: NaiveDate,
    pub total_planned_minutes: f64,
    pub total_actual_minutes: f64,
    pub tasks_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    pub summary: ReportSummary,
    pub report: Report,
}
