//! Error types for `recurring_tasks`.

use crate::tasks::TaskId;
use chrono::NaiveDate;

/// Errors that can occur while managing tasks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON parsing error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error occurred.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `SQLite` database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// An operation referenced a task id that is not in the store.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// A recurring task draft breaks one of the recurrence rules.
    #[error("invalid recurrence configuration: {0}")]
    InvalidRecurrenceConfig(#[from] RecurrenceConfigError),

    /// A task draft is malformed in a way unrelated to recurrence.
    #[error("invalid task: {0}")]
    InvalidTask(String),

    /// A task id is already live in the store.
    #[error("duplicate task id: {0}")]
    DuplicateId(TaskId),

    /// A date string could not be parsed.
    #[error("invalid date: {0}")]
    InvalidDate(String),
}

/// The specific recurrence rule a task violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecurrenceConfigError {
    /// A recurring task has no recurrence pattern.
    #[error("recurring task has no recurrence pattern")]
    MissingPattern,

    /// A recurring task has no due date to compute its successor from.
    #[error("recurring task has no due date")]
    MissingDueDate,

    /// A recurrence pattern is set on a task that is not recurring.
    #[error("recurrence pattern set on a non-recurring task")]
    PatternWithoutRecurrence,

    /// The recurrence end date is earlier than the due date.
    #[error("recurrence ends on {end}, before the due date {due}")]
    EndBeforeDue {
        /// The task's due date.
        due: NaiveDate,
        /// The recurrence end boundary.
        end: NaiveDate,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
