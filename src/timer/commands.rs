use std::str::FromStr;

use crate::{
    report::Report,
    timer::{DisplayUpdate, SwitchOutcome, TimerController},
};

/// A command typed while a session is being tracked.
///
/// Task and subtask numbers are entered 1-based and stored 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCommand {
    Toggle,
    Pause,
    Resume,
    Next,
    Previous,
    Switch(usize),
    AddSubtask(String),
    ToggleSubtask(usize),
    RemoveSubtask(usize),
    Status,
    Report,
    End,
    Discard,
    Help,
}

pub const HELP: &str = "\
commands:
  p | space        pause / resume
  n | next         next task
  b | prev         previous task
  s N              switch to task N
  + NAME           add a subtask to the current task
  x N              toggle subtask N
  - N              remove subtask N
  status           show the current task
  report           show the report so far
  end              finish the session and store the report
  discard          drop the session without a report
  ?                this help";

impl FromStr for TimerCommand {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            // bare enter toggles
            return Ok(TimerCommand::Toggle);
        }

        let (word, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (trimmed, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "p" | "toggle" => TimerCommand::Toggle,
            "pause" => TimerCommand::Pause,
            "resume" => TimerCommand::Resume,
            "n" | "next" => TimerCommand::Next,
            "b" | "prev" | "previous" => TimerCommand::Previous,
            "s" | "switch" => TimerCommand::Switch(parse_position(rest, "task")?),
            "+" | "add" => {
                if rest.is_empty() {
                    return Err("subtask name is empty".to_string());
                }
                TimerCommand::AddSubtask(rest.to_string())
            }
            "x" | "check" => TimerCommand::ToggleSubtask(parse_position(rest, "subtask")?),
            "-" | "rm" => TimerCommand::RemoveSubtask(parse_position(rest, "subtask")?),
            "status" => TimerCommand::Status,
            "report" | "r" => TimerCommand::Report,
            "end" | "q" | "quit" => TimerCommand::End,
            "discard" => TimerCommand::Discard,
            "?" | "h" | "help" => TimerCommand::Help,
            other => return Err(format!("unknown command '{other}' (? for help)")),
        };

        Ok(command)
    }
}

fn parse_position(raw: &str, what: &str) -> Result<usize, String> {
    let number: usize = raw
        .parse()
        .map_err(|_| format!("expected a {what} number, got '{raw}'"))?;
    if number == 0 {
        return Err(format!("{what} numbers start at 1"));
    }
    Ok(number - 1)
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Message(String),
    Display(DisplayUpdate),
    Report(Report),
    Ended(Report),
    Discarded,
}

pub async fn execute(
    controller: &TimerController,
    command: TimerCommand,
) -> Result<CommandOutcome, String> {
    match command {
        TimerCommand::Toggle => {
            let running = controller.toggle_pause().await.map_err(|e| e.to_string())?;
            Ok(CommandOutcome::Message(
                if running { "resumed" } else { "paused" }.to_string(),
            ))
        }
        TimerCommand::Pause => {
            let changed = controller.pause().await.map_err(|e| e.to_string())?;
            Ok(CommandOutcome::Message(
                if changed { "paused" } else { "already paused" }.to_string(),
            ))
        }
        TimerCommand::Resume => {
            let changed = controller.resume().await.map_err(|e| e.to_string())?;
            Ok(CommandOutcome::Message(
                if changed { "resumed" } else { "already running" }.to_string(),
            ))
        }
        TimerCommand::Next => {
            let outcome = controller.next_task().await.map_err(|e| e.to_string())?;
            switched(controller, outcome).await
        }
        TimerCommand::Previous => {
            let outcome = controller.previous_task().await.map_err(|e| e.to_string())?;
            switched(controller, outcome).await
        }
        TimerCommand::Switch(index) => {
            let task_count = controller
                .snapshot()
                .await
                .map(|display| display.task_count)
                .ok_or_else(|| "no active session".to_string())?;
            if index >= task_count {
                return Err(format!("there is no task {} ({task_count} tasks)", index + 1));
            }
            let outcome = controller.switch_to(index).await.map_err(|e| e.to_string())?;
            switched(controller, outcome).await
        }
        TimerCommand::AddSubtask(name) => {
            let added = controller.add_subtask(&name).await.map_err(|e| e.to_string())?;
            if added {
                Ok(CommandOutcome::Message(format!("added subtask '{}'", name.trim())))
            } else {
                Err("subtask name is empty".to_string())
            }
        }
        TimerCommand::ToggleSubtask(index) => {
            match controller.toggle_subtask(index).await.map_err(|e| e.to_string())? {
                Some(true) => Ok(CommandOutcome::Message(format!("subtask {} done", index + 1))),
                Some(false) => Ok(CommandOutcome::Message(format!("subtask {} reopened", index + 1))),
                None => Err(format!("there is no subtask {}", index + 1)),
            }
        }
        TimerCommand::RemoveSubtask(index) => {
            match controller.remove_subtask(index).await.map_err(|e| e.to_string())? {
                Some(subtask) => Ok(CommandOutcome::Message(format!(
                    "removed subtask '{}'",
                    subtask.name
                ))),
                None => Err(format!("there is no subtask {}", index + 1)),
            }
        }
        TimerCommand::Status => controller
            .snapshot()
            .await
            .map(CommandOutcome::Display)
            .ok_or_else(|| "no active session".to_string()),
        TimerCommand::Report => controller
            .report()
            .await
            .map(CommandOutcome::Report)
            .map_err(|e| e.to_string()),
        TimerCommand::End => controller
            .end_session()
            .await
            .map(CommandOutcome::Ended)
            .map_err(|e| format!("{e:#}")),
        TimerCommand::Discard => {
            controller.discard_session().await.map_err(|e| e.to_string())?;
            Ok(CommandOutcome::Discarded)
        }
        TimerCommand::Help => Ok(CommandOutcome::Message(HELP.to_string())),
    }
}

async fn switched(
    controller: &TimerController,
    outcome: SwitchOutcome,
) -> Result<CommandOutcome, String> {
    match outcome {
        SwitchOutcome::Unchanged => Ok(CommandOutcome::Message("already on that task".to_string())),
        SwitchOutcome::Switched { .. } => controller
            .snapshot()
            .await
            .map(CommandOutcome::Display)
            .ok_or_else(|| "no active session".to_string()),
    }
}
