use std::fmt;

use super::aggregate::{Report, TaskReport};

/// Plain-text report for terminal output.
pub fn render_text(report: &Report) -> String {
    TextReport(report).to_string()
}

struct TextReport<'a>(&'a Report);

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(f, "Time Tracking Report (session {})", report.session_id)?;
        writeln!(
            f,
            "Planned: {:.0} min | Tasks: {} | Worked on: {} | Actual: {:.1} min",
            report.planned_total_minutes,
            report.task_count,
            report.tasks_worked_on,
            report.total_actual_minutes
        )?;

        for task in &report.tasks {
            writeln!(f)?;
            write_task(f, task)?;
        }
        Ok(())
    }
}

fn write_task(f: &mut fmt::Formatter<'_>, task: &TaskReport) -> fmt::Result {
    writeln!(f, "{} [{}]", task.name, task.status.as_str())?;
    writeln!(
        f,
        "  Planned: {} min  Actual: {:.1} min  Difference: {:+.1} min  ({:.0}%)",
        task.planned_minutes, task.actual_minutes, task.difference_minutes, task.progress_percent
    )?;

    if !task.subtasks.is_empty() {
        writeln!(
            f,
            "  Subtasks ({}/{} completed)",
            task.subtasks_completed,
            task.subtasks.len()
        )?;
        for subtask in &task.subtasks {
            let mark = if subtask.completed { "✓" } else { "○" };
            writeln!(f, "    {mark} {}", subtask.name)?;
        }
    }

    if !task.top_activities.is_empty() {
        writeln!(f, "  Active windows:")?;
        for activity in &task.top_activities {
            writeln!(f, "    • {} ({} times)", activity.label, activity.count)?;
        }
    }
    Ok(())
}
