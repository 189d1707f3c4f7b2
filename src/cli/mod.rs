//! Command-line interface for the recurring task tracker.
//!
//! ```bash
//! # A plain task
//! recurring-tasks add "Call plumber" --priority urgent
//!
//! # A monthly task that stops after June
//! recurring-tasks add "Water plants" --due 2024-01-31 --every monthly --until 2024-06-30
//!
//! # Complete it; the next occurrence takes its place
//! recurring-tasks toggle 2
//! ```

mod run;

#[cfg(test)]
mod tests;

pub use run::{run, CliOutput};

use crate::tasks::TaskId;
use clap::{Parser, Subcommand};

/// Recurring task tracker.
#[derive(Parser, Debug)]
#[command(name = "recurring-tasks")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a task.
    ///
    /// A recurring task (`--every`) needs a due date; when `--due` is
    /// omitted today's date is used.
    Add {
        /// Title for the task
        title: String,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// Recurrence: daily, weekly, monthly or yearly
        #[arg(long)]
        every: Option<String>,

        /// Last date an occurrence may be due on (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,

        /// Priority: urgent, important, remember or no-urgency
        #[arg(short, long)]
        priority: Option<String>,

        /// Free-form notes
        #[arg(short, long)]
        details: Option<String>,

        /// Ids of related tasks (comma separated)
        #[arg(long, value_delimiter = ',')]
        related: Vec<TaskId>,
    },

    /// Toggle a task's completion.
    ///
    /// Completing a recurring task replaces it with its next occurrence,
    /// unless the recurrence has ended.
    Toggle {
        /// Task ID
        id: TaskId,
    },

    /// Delete a task.
    Delete {
        /// Task ID
        id: TaskId,
    },

    /// List all tasks.
    List {
        /// Print the task records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the history of changes to tasks, newest first.
    #[command(name = "audit-log")]
    AuditLog {
        /// Filter by task ID
        #[arg(long)]
        task: Option<TaskId>,

        /// Maximum number of entries to return
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show version information.
    Version,
}
