use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{format_local, parse_datetime, parse_optional_datetime, parse_optional_local},
    models::{NewSession, SessionRecord},
};

fn row_to_session(row: &Row) -> Result<SessionRecord> {
    let planned_end: Option<String> = row.get("planned_end")?;
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let created_at: String = row.get("created_at")?;

    Ok(SessionRecord {
        id: row.get("id")?,
        planned_total_minutes: row.get("planned_total_minutes")?,
        planned_end: parse_optional_local(planned_end, "planned_end")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Record a new session and return its id.
    pub async fn insert_session(&self, session: &NewSession) -> Result<i64> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (planned_total_minutes, planned_end, started_at, ended_at, created_at)
                 VALUES (?1, ?2, ?3, NULL, ?4)",
                params![
                    record.planned_total_minutes,
                    record.planned_end.as_ref().map(format_local),
                    record.started_at.to_rfc3339(),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn get_session(&self, session_id: i64) -> Result<Option<SessionRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, planned_total_minutes, planned_end, started_at, ended_at, created_at
                 FROM sessions
                 WHERE id = ?1",
            )?;

            let session = stmt
                .query_row(params![session_id], |row| Ok(row_to_session(row)))
                .optional()?
                .transpose()?;

            Ok(session)
        })
        .await
    }

    pub async fn mark_session_ended(&self, session_id: i64, ended_at: DateTime<Utc>) -> Result<()> {
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE sessions SET ended_at = ?1 WHERE id = ?2",
                params![ended_at.to_rfc3339(), session_id],
            )?;

            if rows_affected == 0 {
                return Err(anyhow::anyhow!("Session {session_id} not found"));
            }

            Ok(())
        })
        .await
    }

    /// Stamp every session still missing `ended_at`. Returns how many were closed.
    pub async fn close_unfinished_sessions(&self, ended_at: DateTime<Utc>) -> Result<usize> {
        self.execute(move |conn| {
            let closed = conn.execute(
                "UPDATE sessions SET ended_at = ?1 WHERE ended_at IS NULL",
                params![ended_at.to_rfc3339()],
            )?;
            Ok(closed)
        })
        .await
    }
}
