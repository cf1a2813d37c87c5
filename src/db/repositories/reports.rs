use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_date, parse_datetime, to_i64, to_u64},
    models::{FinalizedSession, ReportSummary, StoredReport, StoredTask},
};
use crate::models::Subtask;
use crate::report::Report;

fn row_to_summary(row: &Row) -> Result<ReportSummary> {
    let report_date: String = row.get("report_date")?;
    let created_at: String = row.get("created_at")?;
    let tasks_count: i64 = row.get("tasks_count")?;

    Ok(ReportSummary {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        report_date: parse_date(&report_date, "report_date")?,
        total_planned_minutes: row.get("total_planned_minutes")?,
        total_actual_minutes: row.get("total_actual_minutes")?,
        tasks_count: to_u64(tasks_count, "tasks_count")? as usize,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Store the outcome of a report generation.
    ///
    /// Runs in one transaction and replaces whatever an earlier generation for the
    /// same session wrote, so generating twice never duplicates rows.
    pub async fn save_finalized_session(&self, finalized: &FinalizedSession) -> Result<()> {
        let record = finalized.clone();
        let report_json =
            serde_json::to_string(&record.report).context("failed to serialize report")?;

        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let rows_affected = tx.execute(
                "UPDATE sessions SET ended_at = ?1 WHERE id = ?2",
                params![record.ended_at.to_rfc3339(), record.session_id],
            )?;
            if rows_affected == 0 {
                return Err(anyhow::anyhow!("Session {} not found", record.session_id));
            }

            // sub_tasks rows go with their parent via ON DELETE CASCADE
            tx.execute(
                "DELETE FROM session_tasks WHERE session_id = ?1",
                params![record.session_id],
            )?;

            for (position, task) in record.tasks.iter().enumerate() {
                tx.execute(
                    "INSERT INTO session_tasks
                     (session_id, position, task_name, planned_minutes, actual_seconds, completed, activity_json)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        record.session_id,
                        to_i64(position as u64)?,
                        task.name,
                        task.planned_minutes,
                        to_i64(task.actual_seconds)?,
                        task.completed,
                        task.activity_json,
                    ],
                )?;
                let session_task_id = tx.last_insert_rowid();

                for (sub_position, subtask) in task.subtasks.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO sub_tasks (session_task_id, position, name, completed)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![
                            session_task_id,
                            to_i64(sub_position as u64)?,
                            subtask.name,
                            subtask.completed,
                        ],
                    )?;
                }
            }

            tx.execute(
                "DELETE FROM daily_reports WHERE session_id = ?1",
                params![record.session_id],
            )?;
            tx.execute(
                "INSERT INTO daily_reports
                 (session_id, report_date, report_json, total_planned_minutes, total_actual_minutes, tasks_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.session_id,
                    record.report_date.format("%Y-%m-%d").to_string(),
                    report_json,
                    record.total_planned_minutes(),
                    record.total_actual_minutes(),
                    to_i64(record.tasks.len() as u64)?,
                    record.ended_at.to_rfc3339(),
                ],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_session_tasks(&self, session_id: i64) -> Result<Vec<StoredTask>> {
        self.execute(move |conn| {
            let mut task_stmt = conn.prepare(
                "SELECT id, session_id, position, task_name, planned_minutes, actual_seconds, completed, activity_json
                 FROM session_tasks
                 WHERE session_id = ?1
                 ORDER BY position ASC",
            )?;
            let mut subtask_stmt = conn.prepare(
                "SELECT name, completed FROM sub_tasks
                 WHERE session_task_id = ?1
                 ORDER BY position ASC",
            )?;

            let mut rows = task_stmt.query(params![session_id])?;
            let mut tasks = Vec::new();
            while let Some(row) = rows.next()? {
                let id: i64 = row.get("id")?;
                let position: i64 = row.get("position")?;
                let actual_seconds: i64 = row.get("actual_seconds")?;

                let subtasks = subtask_stmt
                    .query_map(params![id], |sub| {
                        Ok(Subtask {
                            name: sub.get(0)?,
                            completed: sub.get(1)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                tasks.push(StoredTask {
                    id,
                    session_id: row.get("session_id")?,
                    position: to_u64(position, "position")? as usize,
                    name: row.get("task_name")?,
                    planned_minutes: row.get("planned_minutes")?,
                    actual_seconds: to_u64(actual_seconds, "actual_seconds")?,
                    completed: row.get("completed")?,
                    activity_json: row.get("activity_json")?,
                    subtasks,
                });
            }

            Ok(tasks)
        })
        .await
    }

    /// Report history, newest first.
    pub async fn list_reports(&self, limit: usize) -> Result<Vec<ReportSummary>> {
        let limit = to_i64(limit as u64)?;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, report_date, total_planned_minutes, total_actual_minutes, tasks_count, created_at
                 FROM daily_reports
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut reports = Vec::new();
            while let Some(row) = rows.next()? {
                reports.push(row_to_summary(row)?);
            }

            Ok(reports)
        })
        .await
    }

    pub async fn get_report(&self, report_id: i64) -> Result<Option<StoredReport>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, report_date, report_json, total_planned_minutes, total_actual_minutes, tasks_count, created_at
                 FROM daily_reports
                 WHERE id = ?1",
            )?;

            let stored = stmt
                .query_row(params![report_id], |row| {
                    let report_json: String = row.get("report_json")?;
                    Ok((row_to_summary(row), report_json))
                })
                .optional()?;

            match stored {
                Some((summary, report_json)) => {
                    let report: Report = serde_json::from_str(&report_json)
                        .with_context(|| format!("failed to parse report {report_id}"))?;
                    Ok(Some(StoredReport {
                        summary: summary?,
                        report,
                    }))
                }
                None => Ok(None),
            }
        })
        .await
    }

    /// Returns false when no report with that id exists.
    pub async fn delete_report(&self, report_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM daily_reports WHERE id = ?1", params![report_id])?;
            Ok(rows_affected > 0)
        })
        .await
    }
}
