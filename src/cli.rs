//! Command-line front end.
//!
//! `start` runs a session interactively: the display line is redrawn from the
//! controller's update channel and commands are read line by line from stdin.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::signal;

use crate::{
    db::{Database, TaskTemplate},
    planning::{parse_end_time, MismatchWarning, SessionPlan, TaskDraft},
    report::render_text,
    sensing::{ActivitySampler, SystemFocusSampler},
    settings::{default_data_dir, settings_path, SettingsStore, TrackingSettings},
    timer::{
        commands,
        CommandOutcome, DisplayUpdate, TimerCommand, TimerController, TimerStatus,
    },
};

const DB_FILE_NAME: &str = "taskclock.sqlite3";

type StdinLines = Lines<BufReader<Stdin>>;

/// Plan a work session, track time per task and review reports.
#[derive(Parser, Debug)]
#[command(name = "taskclock")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    TASKCLOCK_DATA_DIR   Database and settings directory (default: platform data dir)
    TASKCLOCK_DEBUG      Set to 1 to sample the focused window on every tick
    RUST_LOG             Log filter (default: info)

EXAMPLES:
    # Work until 5:30 on two tasks
    taskclock start --until 5:30 --task Email=30 --task Code=90

    # Reuse the saved task list
    taskclock start --until 17:00 --from-templates

    # Review stored reports
    taskclock history
    taskclock show 3

    # Sample the focused window every 30 seconds
    taskclock settings --sample-every 30
")]
pub struct Cli {
    /// Directory holding the database and settings.json.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan a session and start tracking it.
    Start {
        /// End time, `H:MM` or `HH:MM`, optionally followed by AM/PM.
        #[arg(short, long)]
        until: String,

        /// A task as NAME=MINUTES. Repeat for each task, in order.
        #[arg(short, long = "task", value_name = "NAME=MINUTES")]
        tasks: Vec<String>,

        /// Prepend the saved task templates to the task list.
        #[arg(long)]
        from_templates: bool,

        /// Save this session's tasks as templates.
        #[arg(long)]
        save_templates: bool,

        /// Start even when the task minutes do not match the session length.
        #[arg(short, long)]
        yes: bool,
    },

    /// List stored reports, newest first.
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Print a stored report.
    Show {
        report_id: i64,

        /// Print the stored JSON document instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Delete a stored report.
    Delete { report_id: i64 },

    /// List saved task templates.
    Templates {
        /// Remove all saved templates.
        #[arg(long)]
        clear: bool,
    },

    /// Show tracking settings, updating any that are given.
    Settings(SettingsArgs),
}

#[derive(Args, Debug, Default)]
struct SettingsArgs {
    /// Milliseconds per clock tick.
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: Option<u64>,

    /// Ticks between focused-window samples.
    #[arg(long, value_name = "TICKS", value_parser = clap::value_parser!(u32).range(1..))]
    sample_every: Option<u32>,

    /// Give up on a focused-window lookup after this long.
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    sample_timeout_ms: Option<u64>,

    /// Longest activity label kept in reports.
    #[arg(long, value_name = "CHARS")]
    label_chars: Option<usize>,

    /// Activities listed per task in reports.
    #[arg(long, value_name = "COUNT")]
    top_activities: Option<usize>,
}

impl SettingsArgs {
    fn is_empty(&self) -> bool {
        self.tick_ms.is_none()
            && self.sample_every.is_none()
            && self.sample_timeout_ms.is_none()
            && self.label_chars.is_none()
            && self.top_activities.is_none()
    }

    fn apply(&self, mut settings: TrackingSettings) -> TrackingSettings {
        if let Some(tick_ms) = self.tick_ms {
            settings.tick_interval_ms = tick_ms;
        }
        if let Some(ticks) = self.sample_every {
            settings.sample_every_ticks = ticks;
        }
        if let Some(timeout_ms) = self.sample_timeout_ms {
            settings.sample_timeout_ms = timeout_ms;
        }
        if let Some(chars) = self.label_chars {
            settings.activity_label_max_chars = chars;
        }
        if let Some(count) = self.top_activities {
            settings.top_activity_count = count;
        }
        settings
    }
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let db = Database::new(data_dir.join(DB_FILE_NAME))?;

    match cli.command {
        Command::Start {
            until,
            tasks,
            from_templates,
            save_templates,
            yes,
        } => {
            let closed = db.close_unfinished_sessions(Utc::now()).await?;
            if closed > 0 {
                warn!("Closed {closed} session(s) left open by an earlier run");
            }

            let settings = SettingsStore::new(settings_path(&data_dir))?
                .tracking()
                .with_env_overrides();

            let mut drafts = Vec::new();
            if from_templates {
                drafts.extend(
                    db.list_templates()
                        .await?
                        .into_iter()
                        .map(|template| TaskDraft::new(template.name, i64::from(template.default_minutes))),
                );
            }
            for raw in &tasks {
                drafts.push(parse_task_arg(raw)?);
            }

            run_start(db, settings, &until, drafts, save_templates, yes).await
        }
        Command::History { limit } => run_history(&db, limit).await,
        Command::Show { report_id, json } => run_show(&db, report_id, json).await,
        Command::Delete { report_id } => {
            if !db.delete_report(report_id).await? {
                bail!("no report with id {report_id}");
            }
            println!("Deleted report {report_id}.");
            Ok(())
        }
        Command::Templates { clear } => run_templates(&db, clear).await,
        Command::Settings(changes) => {
            let store = SettingsStore::new(settings_path(&data_dir))?;
            let settings = update_settings(&store, &changes)?;
            print!("{}", settings_text(&settings));
            Ok(())
        }
    }
}

/// `NAME=MINUTES`. The last `=` splits, so names may contain `=`.
fn parse_task_arg(raw: &str) -> Result<TaskDraft> {
    let (name, minutes) = raw
        .rsplit_once('=')
        .with_context(|| format!("expected NAME=MINUTES, got '{raw}'"))?;
    let minutes: i64 = minutes
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not a whole number of minutes", minutes.trim()))?;
    Ok(TaskDraft::new(name, minutes))
}

async fn run_start(
    db: Database,
    settings: TrackingSettings,
    until: &str,
    drafts: Vec<TaskDraft>,
    save_templates: bool,
    yes: bool,
) -> Result<()> {
    let now = Local::now().naive_local();
    let end = parse_end_time(until, now)?;
    let plan = SessionPlan::until(drafts, end, now)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Some(warning) = plan.mismatch() {
        println!("{}", mismatch_message(&warning));
        if !yes {
            print!("Start anyway? [y/N] ");
            io::stdout().flush()?;
            let answer = lines.next_line().await?.unwrap_or_default();
            if !answer.trim().eq_ignore_ascii_case("y") {
                println!("Aborted.");
                return Ok(());
            }
        }
    }

    if save_templates {
        let templates: Vec<TaskTemplate> = plan
            .to_tasks()
            .into_iter()
            .map(|task| TaskTemplate {
                name: task.name,
                default_minutes: task.planned_minutes,
            })
            .collect();
        db.save_templates(&templates).await?;
        info!("Saved {} task template(s)", templates.len());
    }

    let sampler: Arc<dyn ActivitySampler> = Arc::new(SystemFocusSampler::new());
    let controller = TimerController::new(db, sampler, settings);
    controller.start_session(&plan).await?;

    println!("Tracking until {}. Type ? for commands.", end.format("%H:%M"));
    track(&controller, &mut lines).await
}

async fn track(controller: &TimerController, lines: &mut StdinLines) -> Result<()> {
    let mut updates = controller.subscribe();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let display = updates.borrow_and_update().clone();
                if let Some(display) = display {
                    print!("\r\x1b[2K{}", status_line(&display));
                    io::stdout().flush()?;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // stdin closed: finish like `end`
                    let report = controller.end_session().await?;
                    println!("\n{}", render_text(&report));
                    break;
                };

                let command = match line.parse::<TimerCommand>() {
                    Ok(command) => command,
                    Err(message) => {
                        eprintln!("{message}");
                        continue;
                    }
                };

                match commands::execute(controller, command).await {
                    Ok(CommandOutcome::Message(message)) => println!("{message}"),
                    Ok(CommandOutcome::Display(display)) => println!("{}", status_line(&display)),
                    Ok(CommandOutcome::Report(report)) => println!("{}", render_text(&report)),
                    Ok(CommandOutcome::Ended(report)) => {
                        println!("{}", render_text(&report));
                        break;
                    }
                    Ok(CommandOutcome::Discarded) => {
                        println!("Session discarded.");
                        break;
                    }
                    Err(message) => eprintln!("{message}"),
                }
            }
            _ = signal::ctrl_c() => {
                let report = controller.end_session().await?;
                println!("\n{}", render_text(&report));
                break;
            }
        }
    }

    Ok(())
}

fn mismatch_message(warning: &MismatchWarning) -> String {
    let side = if warning.task_minutes > warning.session_minutes {
        "over"
    } else {
        "under"
    };
    format!(
        "Task times add up to {} min but the session is {} min ({} min {side}).",
        warning.task_minutes, warning.session_minutes, warning.difference
    )
}

fn status_line(display: &DisplayUpdate) -> String {
    let remaining = if display.flash {
        format!("\x1b[7m{}\x1b[0m", display.remaining_text())
    } else {
        display.remaining_text()
    };
    let paused = if display.status == TimerStatus::Paused {
        "  (paused)"
    } else {
        ""
    };

    format!(
        "[{}/{}] {} ({} min)  {}  {}{}",
        display.task_index + 1,
        display.task_count,
        display.task_name,
        display.planned_minutes,
        display.timer_text(),
        remaining,
        paused
    )
}

async fn run_history(db: &Database, limit: usize) -> Result<()> {
    let reports = db.list_reports(limit).await?;
    if reports.is_empty() {
        println!("No reports yet.");
        return Ok(());
    }

    println!("{:>4}  {:<10}  {:>7}  {:>9}  {:>8}  {:>5}", "ID", "DATE", "SESSION", "PLANNED", "ACTUAL", "TASKS");
    for report in reports {
        println!(
            "{:>4}  {:<10}  {:>7}  {:>7.0}m  {:>7.1}m  {:>5}",
            report.id,
            report.report_date.format("%Y-%m-%d"),
            report.session_id,
            report.total_planned_minutes,
            report.total_actual_minutes,
            report.tasks_count
        );
    }
    Ok(())
}

async fn run_show(db: &Database, report_id: i64, json: bool) -> Result<()> {
    let Some(stored) = db.get_report(report_id).await? else {
        bail!("no report with id {report_id}");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stored.report)?);
    } else {
        println!("Date: {}", stored.summary.report_date.format("%Y-%m-%d"));
        print!("{}", render_text(&stored.report));
    }
    Ok(())
}

async fn run_templates(db: &Database, clear: bool) -> Result<()> {
    if clear {
        let removed = db.clear_templates().await?;
        println!("Removed {removed} template row(s).");
        return Ok(());
    }

    let templates = db.list_templates().await?;
    if templates.is_empty() {
        println!("No templates saved. Use `start --save-templates` to save a task list.");
    }
    for template in templates {
        println!("{} = {} min", template.name, template.default_minutes);
    }
    Ok(())
}

/// Apply `changes` and persist them. Nothing is written when no change is given.
fn update_settings(store: &SettingsStore, changes: &SettingsArgs) -> Result<TrackingSettings> {
    let current = store.tracking();
    if changes.is_empty() {
        return Ok(current);
    }

    let updated = changes.apply(current);
    store.update_tracking(updated.clone())?;
    info!("Saved tracking settings");
    Ok(updated)
}

fn settings_text(settings: &TrackingSettings) -> String {
    format!(
        "tick interval     {} ms\n\
         sample every      {} ticks\n\
         sample timeout    {} ms\n\
         label max chars   {}\n\
         top activities    {}\n",
        settings.tick_interval_ms,
        settings.sample_every_ticks,
        settings.sample_timeout_ms,
        settings.activity_label_max_chars,
        settings.top_activity_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_task_arg() {
        let draft = parse_task_arg("Code review=45").unwrap();
        assert_eq!(draft.name, "Code review");
        assert_eq!(draft.planned_minutes, 45);

        assert_eq!(parse_task_arg("a=b=10").unwrap().name, "a=b");
        assert!(parse_task_arg("Email").is_err());
        assert!(parse_task_arg("Email=soon").is_err());
    }

    #[test]
    fn test_cli_parses_start() {
        let cli = Cli::try_parse_from([
            "taskclock", "start", "--until", "5:30", "--task", "Email=30", "-t", "Code=90", "--yes",
        ])
        .unwrap();
        match cli.command {
            Command::Start { until, tasks, yes, from_templates, .. } => {
                assert_eq!(until, "5:30");
                assert_eq!(tasks, vec!["Email=30", "Code=90"]);
                assert!(yes);
                assert!(!from_templates);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_settings_command_updates_stored_settings() {
        let dir = TempDir::new().unwrap();
        let path = settings_path(dir.path());

        let cli = Cli::try_parse_from([
            "taskclock", "settings", "--sample-every", "30", "--top-activities", "3",
        ])
        .unwrap();
        let Command::Settings(changes) = cli.command else {
            panic!("expected the settings command");
        };

        let store = SettingsStore::new(path.clone()).unwrap();
        let updated = update_settings(&store, &changes).unwrap();
        assert_eq!(updated.sample_every_ticks, 30);
        assert_eq!(updated.top_activity_count, 3);
        assert_eq!(updated.tick_interval_ms, 1000);

        let reloaded = SettingsStore::new(path.clone()).unwrap().tracking();
        assert_eq!(reloaded, updated);
        assert!(settings_text(&reloaded).contains("sample every      30 ticks"));

        // showing alone writes nothing
        let empty = TempDir::new().unwrap();
        let store = SettingsStore::new(settings_path(empty.path())).unwrap();
        let shown = update_settings(&store, &SettingsArgs::default()).unwrap();
        assert_eq!(shown, TrackingSettings::default());
        assert!(!settings_path(empty.path()).exists());

        assert!(Cli::try_parse_from(["taskclock", "settings", "--sample-every", "0"]).is_err());
    }

    #[test]
    fn test_mismatch_message_names_direction() {
        let over = MismatchWarning {
            session_minutes: 60,
            task_minutes: 75,
            difference: 15,
        };
        assert_eq!(
            mismatch_message(&over),
            "Task times add up to 75 min but the session is 60 min (15 min over)."
        );

        let under = MismatchWarning {
            session_minutes: 80,
            task_minutes: 75,
            difference: 5,
        };
        assert!(mismatch_message(&under).ends_with("(5 min under)."));
    }

    #[test]
    fn test_status_line() {
        let display = DisplayUpdate {
            task_index: 1,
            task_count: 3,
            task_name: "Code".into(),
            planned_minutes: 45,
            elapsed_seconds: 61,
            remaining_seconds: 2639,
            exceeded: false,
            flash: false,
            is_running: false,
            status: TimerStatus::Paused,
        };
        assert_eq!(
            status_line(&display),
            "[2/3] Code (45 min)  00:01:01  43m 59s left  (paused)"
        );
    }
}
