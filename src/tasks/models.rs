//! Task model types for the recurring task tracker.

use crate::error::{Error, RecurrenceConfigError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

/// Identifier of a task, unique among the live tasks of a store.
pub type TaskId = i64;

/// Presentation tag attached to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    /// Needs attention now.
    Urgent,
    /// Should be done soon.
    Important,
    /// Worth keeping in mind.
    Remember,
    /// No time pressure.
    NoUrgency,
}

impl Priority {
    /// Parse a priority from its record name.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid priority.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> std::result::Result<Self, InvalidPriority> {
        match s.to_lowercase().as_str() {
            "urgent" => Ok(Self::Urgent),
            "important" => Ok(Self::Important),
            "remember" => Ok(Self::Remember),
            "no-urgency" | "no_urgency" => Ok(Self::NoUrgency),
            _ => Err(InvalidPriority(s.to_string())),
        }
    }

    /// Get the record name of the priority.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Important => "important",
            Self::Remember => "remember",
            Self::NoUrgency => "no-urgency",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid priority string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPriority(pub String);

impl std::fmt::Display for InvalidPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid priority: '{}' (must be one of: urgent, important, remember, no-urgency)",
            self.0
        )
    }
}

impl std::error::Error for InvalidPriority {}

/// How a recurring task advances from one occurrence to the next.
///
/// Records may carry pattern names this crate does not know. Those load as
/// [`RecurrencePattern::Unrecognized`] instead of failing, keep the name they
/// were written with, and advance like [`RecurrencePattern::Daily`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecurrencePattern {
    /// Every day.
    Daily,
    /// Every seven days.
    Weekly,
    /// Same day next month, clamped to the month's last day.
    Monthly,
    /// Same day next year, clamped for February 29.
    Yearly,
    /// A pattern name that was not recognized when the record was read.
    Unrecognized(String),
}

impl RecurrencePattern {
    /// Parse a pattern name. Unknown names map to `Unrecognized`.
    ///
    /// Accepts the English names in any case and the localized names used by
    /// older records.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "daily" | "diariamente" => Self::Daily,
            "weekly" | "semanalmente" => Self::Weekly,
            "monthly" | "mensalmente" => Self::Monthly,
            "yearly" | "anualmente" => Self::Yearly,
            _ => Self::Unrecognized(s.trim().to_string()),
        }
    }

    /// Get the record name of the pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
            Self::Yearly => "Yearly",
            Self::Unrecognized(name) => name,
        }
    }
}

impl std::fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for RecurrencePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RecurrencePattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::parse(&name))
    }
}

/// Parse a calendar date from a record or command line.
///
/// Accepts `YYYY-MM-DD` and ISO timestamps such as `2024-01-31T10:00:00.000Z`.
/// For timestamps only the written calendar date is kept; no timezone
/// conversion happens.
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] if the string holds no valid date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let trimmed = s.trim();
    let date_part =
        trimmed.split_once(|c| c == 'T' || c == ' ').map_or(trimmed, |(date, _)| date);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| Error::InvalidDate(s.to_string()))
}

/// Serde adapter for optional calendar dates in task records.
mod iso_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| super::parse_date(&s).map_err(serde::de::Error::custom)).transpose()
    }
}

/// Derived completion state of a task. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurrenceState {
    /// Not completed.
    Active,
    /// Completed and not going to be replaced by a successor.
    DoneTerminal,
}

/// A task in the tracker.
///
/// The serialized form is the task record exchanged with storage
/// collaborators: camelCase keys, ISO calendar dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier within the store.
    pub id: TaskId,
    /// Short title describing the task.
    pub title: String,
    /// Whether this occurrence is done.
    #[serde(default)]
    pub completed: bool,
    /// Presentation tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Due date of this occurrence.
    #[serde(default, with = "iso_date", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Whether completing this task spawns a successor.
    #[serde(default)]
    pub is_recurring: bool,
    /// Recurrence pattern; set exactly when `is_recurring` is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_pattern: Option<RecurrencePattern>,
    /// Last date an occurrence of the chain may be due on.
    #[serde(default, with = "iso_date", skip_serializing_if = "Option::is_none")]
    pub recurrence_end_date: Option<NaiveDate>,
    /// Ids of other tasks this one refers to. Informational only.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub related_tasks: BTreeSet<TaskId>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Task {
    /// Derive the completion state of this task.
    #[must_use]
    pub const fn occurrence_state(&self) -> OccurrenceState {
        if self.completed {
            OccurrenceState::DoneTerminal
        } else {
            OccurrenceState::Active
        }
    }
}

/// Everything needed to create a task except its id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    /// Short title describing the task. Must not be blank.
    pub title: String,
    /// Presentation tag.
    pub priority: Option<Priority>,
    /// Due date of the first occurrence.
    pub due_date: Option<NaiveDate>,
    /// Whether the task recurs.
    pub is_recurring: bool,
    /// Recurrence pattern.
    pub recurrence_pattern: Option<RecurrencePattern>,
    /// Recurrence end boundary (inclusive).
    pub recurrence_end_date: Option<NaiveDate>,
    /// Related task ids.
    pub related_tasks: BTreeSet<TaskId>,
    /// Free-form notes.
    pub details: Option<String>,
}

impl TaskDraft {
    /// Start a draft with the given title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Self::default() }
    }

    /// Set the priority.
    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the due date.
    #[must_use]
    pub const fn due(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    /// Make the task recur with the given pattern.
    #[must_use]
    pub fn recurring(mut self, pattern: RecurrencePattern) -> Self {
        self.is_recurring = true;
        self.recurrence_pattern = Some(pattern);
        self
    }

    /// Stop the recurrence after the given date.
    #[must_use]
    pub const fn until(mut self, end: NaiveDate) -> Self {
        self.recurrence_end_date = Some(end);
        self
    }

    /// Attach free-form notes.
    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Relate this task to other tasks.
    #[must_use]
    pub fn related(mut self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.related_tasks.extend(ids);
        self
    }

    /// Check the draft against the task invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTask`] for a blank title and
    /// [`Error::InvalidRecurrenceConfig`] for a malformed recurrence.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidTask("title must not be empty".to_string()));
        }

        if !self.is_recurring {
            if self.recurrence_pattern.is_some() {
                return Err(RecurrenceConfigError::PatternWithoutRecurrence.into());
            }
            return Ok(());
        }

        if self.recurrence_pattern.is_none() {
            return Err(RecurrenceConfigError::MissingPattern.into());
        }
        let Some(due) = self.due_date else {
            return Err(RecurrenceConfigError::MissingDueDate.into());
        };
        if let Some(end) = self.recurrence_end_date {
            if end < due {
                return Err(RecurrenceConfigError::EndBeforeDue { due, end }.into());
            }
        }
        Ok(())
    }

    /// Turn the draft into an active task with the given id.
    #[must_use]
    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            title: self.title,
            completed: false,
            priority: self.priority,
            due_date: self.due_date,
            is_recurring: self.is_recurring,
            recurrence_pattern: self.recurrence_pattern,
            recurrence_end_date: self.recurrence_end_date,
            related_tasks: self.related_tasks,
            details: self.details,
        }
    }
}

impl From<Task> for TaskDraft {
    fn from(task: Task) -> Self {
        Self {
            title: task.title,
            priority: task.priority,
            due_date: task.due_date,
            is_recurring: task.is_recurring,
            recurrence_pattern: task.recurrence_pattern,
            recurrence_end_date: task.recurrence_end_date,
            related_tasks: task.related_tasks,
            details: task.details,
        }
    }
}

/// An entry in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique identifier for the entry.
    pub id: i64,
    /// ISO 8601 timestamp when the operation occurred.
    pub timestamp: String,
    /// Type of operation (`create`, `remove`, `replace`, `complete`, `reopen`).
    pub operation: String,
    /// ID of the affected task.
    pub task_id: Option<TaskId>,
    /// Previous value (JSON serialized, if applicable).
    pub old_value: Option<String>,
    /// New value (JSON serialized, if applicable).
    pub new_value: Option<String>,
    /// Additional details about the operation.
    pub details: Option<String>,
}
