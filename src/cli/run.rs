//! Command execution for the CLI.

use crate::cli::Command;
use crate::tasks::{
    parse_date, Priority, RecurrencePattern, SqliteTaskStore, Task, TaskDraft, TaskId,
    ToggleOutcome,
};
use crate::tracker::Tracker;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use std::process::ExitCode;

/// Output from running the CLI, with separate stdout and stderr messages.
#[derive(Debug)]
pub struct CliOutput {
    /// Exit code for the process.
    pub exit_code: ExitCode,
    /// Messages to print to stdout.
    pub stdout: Vec<String>,
    /// Messages to print to stderr.
    pub stderr: Vec<String>,
}

/// Default result limit for the audit log.
const DEFAULT_RESULT_LIMIT: usize = 50;

/// Run a CLI command against the tracker of the project in `base_dir`.
pub fn run(command: Command, base_dir: &Path) -> CliOutput {
    match command {
        Command::Version => run_version(),
        command => match Tracker::open(base_dir) {
            Ok(tracker) => run_task_cmd(&tracker, command),
            Err(e) => error_output(e.to_string()),
        },
    }
}

fn run_version() -> CliOutput {
    success_output(format!("recurring-tasks v{}", crate::VERSION))
}

fn run_task_cmd(tracker: &Tracker<SqliteTaskStore>, command: Command) -> CliOutput {
    match command {
        Command::Add { title, due, every, until, priority, details, related } => {
            let args = AddArgs { title, due, every, until, priority, details, related };
            run_add(tracker, args)
        }
        Command::Toggle { id } => run_toggle(tracker, id),
        Command::Delete { id } => run_delete(tracker, id),
        Command::List { json } => run_list(tracker, json),
        Command::AuditLog { task, limit } => run_audit_log(tracker, task, limit),
        Command::Version => run_version(),
    }
}

struct AddArgs {
    title: String,
    due: Option<String>,
    every: Option<String>,
    until: Option<String>,
    priority: Option<String>,
    details: Option<String>,
    related: Vec<TaskId>,
}

impl AddArgs {
    fn into_draft(self) -> Result<TaskDraft, String> {
        let mut draft = TaskDraft::new(self.title).related(self.related);
        draft.details = self.details;

        if let Some(priority) = self.priority {
            draft = draft.priority(Priority::from_str(&priority).map_err(|e| e.to_string())?);
        }
        if let Some(due) = self.due {
            draft = draft.due(parse_date(&due).map_err(|e| e.to_string())?);
        }
        if let Some(until) = self.until {
            draft = draft.until(parse_date(&until).map_err(|e| e.to_string())?);
        }
        if let Some(every) = self.every {
            let pattern = RecurrencePattern::parse(&every);
            if matches!(pattern, RecurrencePattern::Unrecognized(_)) {
                return Err(format!(
                    "unknown recurrence '{every}' (must be one of: daily, weekly, monthly, yearly)"
                ));
            }
            draft = draft.recurring(pattern);
            if draft.due_date.is_none() {
                draft = draft.due(chrono::Local::now().date_naive());
            }
        }
        Ok(draft)
    }
}

fn run_add(tracker: &Tracker<SqliteTaskStore>, args: AddArgs) -> CliOutput {
    let draft = match args.into_draft() {
        Ok(d) => d,
        Err(e) => return error_output(e),
    };

    match tracker.create_task(draft) {
        Ok(task) => success_output(format!("Created {}", describe(&task))),
        Err(e) => error_output(e.to_string()),
    }
}

fn run_toggle(tracker: &Tracker<SqliteTaskStore>, id: TaskId) -> CliOutput {
    match tracker.toggle(id) {
        Ok(ToggleOutcome::Flipped(task)) if task.completed => {
            success_output(format!("Completed {}", describe(&task)))
        }
        Ok(ToggleOutcome::Flipped(task)) => success_output(format!("Reopened {}", describe(&task))),
        Ok(ToggleOutcome::Spawned { retired, next }) => success_output(format!(
            "Completed #{}; next occurrence {}",
            retired.id,
            describe(&next)
        )),
        Ok(ToggleOutcome::ChainEnded(task)) => {
            success_output(format!("Completed {} (recurrence ended)", describe(&task)))
        }
        Err(e) => error_output(e.to_string()),
    }
}

fn run_delete(tracker: &Tracker<SqliteTaskStore>, id: TaskId) -> CliOutput {
    match tracker.delete_task(id) {
        Ok(()) => success_output(format!("Deleted #{id}")),
        Err(e) => error_output(e.to_string()),
    }
}

fn run_list(tracker: &Tracker<SqliteTaskStore>, json: bool) -> CliOutput {
    let tasks = match tracker.list_tasks() {
        Ok(t) => t,
        Err(e) => return error_output(e.to_string()),
    };

    if json {
        return json_output(&tasks);
    }
    if tasks.is_empty() {
        return success_output("No tasks".to_string());
    }
    let lines = tasks
        .iter()
        .map(|task| {
            let mark = if task.completed { 'x' } else { ' ' };
            format!("[{mark}] {}", describe(task))
        })
        .collect();
    CliOutput { exit_code: ExitCode::SUCCESS, stdout: lines, stderr: vec![] }
}

fn run_audit_log(
    tracker: &Tracker<SqliteTaskStore>,
    task: Option<TaskId>,
    limit: Option<usize>,
) -> CliOutput {
    let limit = Some(limit.unwrap_or(DEFAULT_RESULT_LIMIT));
    match tracker.audit_log(task, limit) {
        Ok(entries) => json_output(&entries),
        Err(e) => error_output(e.to_string()),
    }
}

/// One-line summary of a task, such as
/// `#3 Water plants (due 2024-02-29, monthly until 2024-06-30) [remember]`.
fn describe(task: &Task) -> String {
    let mut line = format!("#{} {}", task.id, task.title);

    let mut schedule = Vec::new();
    if let Some(due) = task.due_date {
        schedule.push(format!("due {due}"));
    }
    if task.is_recurring {
        let mut every = task
            .recurrence_pattern
            .as_ref()
            .map_or_else(|| "daily".to_string(), |p| p.as_str().to_lowercase());
        if let Some(end) = task.recurrence_end_date {
            let _ = write!(every, " until {end}");
        }
        schedule.push(every);
    }
    if !schedule.is_empty() {
        let _ = write!(line, " ({})", schedule.join(", "));
    }
    if let Some(priority) = task.priority {
        let _ = write!(line, " [{priority}]");
    }
    line
}

fn json_output<T: Serialize>(value: &T) -> CliOutput {
    match serde_json::to_string_pretty(value) {
        Ok(json) => CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![json], stderr: vec![] },
        Err(e) => error_output(e.to_string()),
    }
}

fn success_output(message: String) -> CliOutput {
    CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![message], stderr: vec![] }
}

fn error_output(message: String) -> CliOutput {
    CliOutput { exit_code: ExitCode::from(1), stdout: vec![], stderr: vec![message] }
}
