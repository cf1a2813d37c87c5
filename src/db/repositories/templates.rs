use anyhow::Result;
use chrono::Utc;
use rusqlite::params;

use crate::db::{connection::Database, models::TaskTemplate};

impl Database {
    pub async fn save_templates(&self, templates: &[TaskTemplate]) -> Result<()> {
        let templates = templates.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let created_at = Utc::now().to_rfc3339();
            for template in &templates {
                tx.execute(
                    "INSERT INTO task_templates (name, default_minutes, created_at)
                     VALUES (?1, ?2, ?3)",
                    params![template.name, template.default_minutes, created_at],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Distinct `(name, minutes)` pairs in the order they were first saved.
    pub async fn list_templates(&self) -> Result<Vec<TaskTemplate>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, default_minutes FROM task_templates
                 GROUP BY name, default_minutes
                 ORDER BY MIN(id) ASC",
            )?;

            let templates = stmt
                .query_map([], |row| {
                    Ok(TaskTemplate {
                        name: row.get(0)?,
                        default_minutes: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(templates)
        })
        .await
    }

    pub async fn clear_templates(&self) -> Result<usize> {
        self.execute(|conn| Ok(conn.execute("DELETE FROM task_templates", [])?))
            .await
    }
}
