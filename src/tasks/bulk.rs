//! Bulk import and export of task records via JSON.
//!
//! # Usage
//!
//! ```bash
//! bulk-tasks export > tasks.json
//! bulk-tasks import < tasks.json
//! ```
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "tasks": [
//!     {
//!       "id": 1,
//!       "title": "Water plants",
//!       "dueDate": "2024-01-31",
//!       "isRecurring": true,
//!       "recurrencePattern": "Monthly",
//!       "relatedTasks": [2]
//!     },
//!     {
//!       "id": 2,
//!       "title": "Buy fertilizer",
//!       "priority": "remember"
//!     }
//!   ]
//! }
//! ```
//!
//! On import the `id` field is only a reference for `relatedTasks` within
//! the batch. Every record gets a freshly allocated id, and references to
//! other records of the batch are rewritten to the new ids. References to
//! ids outside the batch are kept unchanged.

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::paths;
use crate::tasks::models::{parse_date, Priority, RecurrencePattern, Task, TaskDraft, TaskId};
use crate::tasks::{SqliteTaskStore, TaskStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::path::PathBuf;

/// Input and output document for bulk operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskDocument<T> {
    /// The task records.
    pub tasks: Vec<T>,
}

/// A task record as read by `import`.
///
/// Dates stay strings here so that one bad record is reported on its own
/// instead of failing the whole document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Id of the record in the exporting store.
    #[serde(default)]
    pub id: Option<TaskId>,
    /// Task title.
    pub title: String,
    /// Whether the task was done.
    #[serde(default)]
    pub completed: bool,
    /// Priority name.
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Due date, `YYYY-MM-DD` or an ISO timestamp.
    #[serde(default)]
    pub due_date: Option<String>,
    /// Whether the task recurs.
    #[serde(default)]
    pub is_recurring: bool,
    /// Recurrence pattern name.
    #[serde(default)]
    pub recurrence_pattern: Option<RecurrencePattern>,
    /// Recurrence end date.
    #[serde(default)]
    pub recurrence_end_date: Option<String>,
    /// Ids of related records.
    #[serde(default)]
    pub related_tasks: BTreeSet<TaskId>,
    /// Free-form notes.
    #[serde(default)]
    pub details: Option<String>,
}

impl TaskRecord {
    fn to_draft(&self) -> Result<TaskDraft> {
        let parse = |date: &Option<String>| date.as_deref().map(parse_date).transpose();
        Ok(TaskDraft {
            title: self.title.clone(),
            priority: self.priority,
            due_date: parse(&self.due_date)?,
            is_recurring: self.is_recurring,
            recurrence_pattern: self.recurrence_pattern.clone(),
            recurrence_end_date: parse(&self.recurrence_end_date)?,
            related_tasks: self.related_tasks.clone(),
            details: self.details.clone(),
        })
    }
}

/// A record that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportError {
    /// The record's id in the input, if it had one.
    pub source_id: Option<TaskId>,
    /// Why the record was rejected.
    pub message: String,
}

/// Output format for `import`.
#[derive(Debug, Serialize)]
pub struct ImportOutput {
    /// Number of tasks created.
    pub created: usize,
    /// Mapping from input ids to the ids the tasks were created with.
    pub id_map: BTreeMap<TaskId, TaskId>,
    /// Records that were rejected (import continues past them).
    pub errors: Vec<ImportError>,
}

const fn is_record_error(error: &Error) -> bool {
    matches!(error, Error::InvalidTask(_) | Error::InvalidRecurrenceConfig(_) | Error::InvalidDate(_))
}

/// Create tasks from records.
///
/// Each record goes through normal validation. Invalid records are
/// reported in the output and skipped; tasks already created stay.
///
/// # Errors
///
/// Returns an error if the store fails for a reason other than an invalid
/// record.
pub fn import_tasks(store: &dyn TaskStore, records: &[TaskRecord]) -> Result<ImportOutput> {
    let mut output = ImportOutput { created: 0, id_map: BTreeMap::new(), errors: Vec::new() };
    let mut created = Vec::with_capacity(records.len());

    // First pass: create all tasks
    for record in records {
        let draft = match record.to_draft() {
            Ok(draft) => draft,
            Err(e) => {
                output.errors.push(ImportError { source_id: record.id, message: e.to_string() });
                continue;
            }
        };

        let mut task = match store.create(draft) {
            Ok(task) => task,
            Err(e) if is_record_error(&e) => {
                output.errors.push(ImportError { source_id: record.id, message: e.to_string() });
                continue;
            }
            Err(e) => return Err(e),
        };
        if record.completed {
            task = store.set_completed(task.id, true)?;
        }

        if let Some(source_id) = record.id {
            output.id_map.insert(source_id, task.id);
        }
        output.created += 1;
        created.push(task);
    }

    // Second pass: point relatedTasks at the new ids
    let remapped: Vec<Task> = created
        .iter()
        .map(|task| Task {
            related_tasks: task
                .related_tasks
                .iter()
                .map(|id| output.id_map.get(id).copied().unwrap_or(*id))
                .collect(),
            ..task.clone()
        })
        .collect();

    if remapped != created {
        // Replacing every created task in creation order keeps their order
        for task in remapped {
            store.replace(task.id, task)?;
        }
    }

    Ok(output)
}

/// Parse a JSON document and import its tasks.
///
/// # Errors
///
/// Returns an error if the JSON is invalid or the store fails.
pub fn import_from_json(store: &dyn TaskStore, json: &str) -> Result<ImportOutput> {
    let input: TaskDocument<TaskRecord> = serde_json::from_str(json)?;
    import_tasks(store, &input.tasks)
}

/// Export every task as a JSON document, in listing order.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn export_to_json(store: &dyn TaskStore) -> Result<String> {
    let document = TaskDocument { tasks: store.list()? };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Open the default task store.
///
/// Uses the `TASKS_DB_PATH` env var if set, otherwise the database named by
/// the config of the current directory.
///
/// # Errors
///
/// Returns an error if the config is invalid or the database cannot be
/// opened.
pub fn open_default_store() -> Result<SqliteTaskStore> {
    if let Ok(db_path) = env::var("TASKS_DB_PATH") {
        return SqliteTaskStore::new(PathBuf::from(db_path));
    }

    let cwd = env::current_dir()?;
    let config = TrackerConfig::load_or_default(&cwd)?;
    let db_path = paths::database_path(&config, &cwd).ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "could not determine a data directory for the task database",
        ))
    })?;
    SqliteTaskStore::open_with_first_id(&db_path, config.first_id)
}

/// Print usage information for the bulk-tasks CLI.
pub fn print_usage() {
    eprintln!(
        r#"Usage: bulk-tasks <command>

Commands:
  import    Create tasks from JSON input (stdin)
  export    Write all tasks as JSON (stdout)

JSON format:
  {{"tasks": [{{"id": 1, "title": "...", "dueDate": "2024-01-31",
              "isRecurring": true, "recurrencePattern": "Monthly",
              "relatedTasks": [2]}}]}}

The database is taken from TASKS_DB_PATH, or from
.recurring-tasks/config.yaml in the current directory.
"#
    );
}
