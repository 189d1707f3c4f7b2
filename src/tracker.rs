//! The tracker: the operation surface offered to user interfaces.
//!
//! Wraps a store and its completion state machine, and writes each
//! operation to the debug event log when one is attached.

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::event_log::EventLog;
use crate::paths;
use crate::tasks::{
    AuditEntry, CompletionStateMachine, SqliteTaskStore, Task, TaskDraft, TaskId, TaskStore,
    ToggleOutcome,
};
use serde_json::json;
use std::path::Path;

/// Task tracker over a store.
#[derive(Debug)]
pub struct Tracker<S> {
    machine: CompletionStateMachine<S>,
    events: Option<EventLog>,
}

impl Tracker<SqliteTaskStore> {
    /// Open the tracker for a project directory.
    ///
    /// Loads `.recurring-tasks/config.yaml` (defaults when absent), opens the
    /// configured database and attaches the event log if `debug_logging` is
    /// on.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed, no database location
    /// can be determined, or the database cannot be opened.
    pub fn open(base_dir: &Path) -> Result<Self> {
        let config = TrackerConfig::load_or_default(base_dir)?;
        Self::open_with_config(base_dir, &config)
    }

    /// Open the tracker with an already loaded config.
    ///
    /// # Errors
    ///
    /// Returns an error if no database location can be determined or the
    /// database cannot be opened.
    pub fn open_with_config(base_dir: &Path, config: &TrackerConfig) -> Result<Self> {
        let db_path = paths::database_path(config, base_dir).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine a data directory for the task database",
            ))
        })?;
        let store = SqliteTaskStore::open_with_first_id(&db_path, config.first_id)?;

        let mut tracker = Self::new(store);
        if config.debug_logging {
            tracker = tracker.with_event_log(EventLog::new(paths::events_path(&db_path)));
        }
        Ok(tracker)
    }
}

impl<S: TaskStore> Tracker<S> {
    /// Create a tracker over `store` without event logging.
    pub const fn new(store: S) -> Self {
        Self { machine: CompletionStateMachine::new(store), events: None }
    }

    /// Attach an event log.
    #[must_use]
    pub fn with_event_log(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        self.machine.store()
    }

    /// The attached event log, if any.
    pub const fn event_log(&self) -> Option<&EventLog> {
        self.events.as_ref()
    }

    /// Create a task from a draft.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecurrenceConfig`] or [`Error::InvalidTask`]
    /// for a malformed draft; nothing is stored in that case.
    pub fn create_task(&self, draft: TaskDraft) -> Result<Task> {
        let result = self.machine.store().create(draft);
        self.log("create", &result, |task| json!({ "task": task }));
        result
    }

    /// Toggle a task's completion; see [`CompletionStateMachine::toggle`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn toggle(&self, id: TaskId) -> Result<ToggleOutcome> {
        let result = self.machine.toggle(id);
        self.log("toggle", &result, |outcome| match outcome {
            ToggleOutcome::Flipped(task) => json!({ "id": id, "flipped": task }),
            ToggleOutcome::Spawned { retired, next } => {
                json!({ "id": id, "retired": retired, "spawned": next })
            }
            ToggleOutcome::ChainEnded(task) => json!({ "id": id, "chain_ended": task }),
        });
        result
    }

    /// Toggle a task's completion and return the task live afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn toggle_completion(&self, id: TaskId) -> Result<Task> {
        self.toggle(id).map(ToggleOutcome::into_task)
    }

    /// Delete a task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the task does not exist.
    pub fn delete_task(&self, id: TaskId) -> Result<()> {
        let result = self.machine.store().remove(id);
        self.log("delete", &result, |task| json!({ "task": task }));
        result.map(|_| ())
    }

    /// Get a task by id.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn find_task(&self, id: TaskId) -> Result<Option<Task>> {
        self.machine.store().find(id)
    }

    /// List all tasks in insertion order.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.machine.store().list()
    }

    /// Get audit log entries, newest first.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn audit_log(
        &self,
        task_id: Option<TaskId>,
        limit: Option<usize>,
    ) -> Result<Vec<AuditEntry>> {
        self.machine.store().get_audit_log(task_id, limit)
    }

    fn log<T>(&self, operation: &str, result: &Result<T>, ok: impl FnOnce(&T) -> serde_json::Value) {
        let Some(events) = &self.events else {
            return;
        };
        let payload = match result {
            Ok(value) => ok(value),
            Err(e) => json!({ "error": e.to_string() }),
        };
        events.record(operation, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{InMemoryTaskStore, RecurrencePattern};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_surface_operations() {
        let tracker = Tracker::new(InMemoryTaskStore::new());
        let task = tracker.create_task(TaskDraft::new("Call plumber")).unwrap();

        assert!(tracker.toggle_completion(task.id).unwrap().completed);
        assert_eq!(tracker.list_tasks().unwrap().len(), 1);

        tracker.delete_task(task.id).unwrap();
        assert!(matches!(tracker.delete_task(task.id), Err(Error::NotFound(_))));
        assert!(matches!(tracker.toggle_completion(task.id), Err(Error::NotFound(_))));
        assert!(tracker.find_task(task.id).unwrap().is_none());
    }

    #[test]
    fn test_without_event_log_nothing_is_written() {
        let tracker = Tracker::new(InMemoryTaskStore::new());
        tracker.create_task(TaskDraft::new("Quiet")).unwrap();
        assert!(tracker.event_log().is_none());
    }

    #[test]
    fn test_event_log_records_operations() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("events.jsonl"));
        let tracker = Tracker::new(InMemoryTaskStore::new()).with_event_log(log.clone());

        let draft =
            TaskDraft::new("Gym").due(date(2024, 1, 1)).recurring(RecurrencePattern::Weekly);
        let task = tracker.create_task(draft).unwrap();
        tracker.toggle(task.id).unwrap();
        let _ = tracker.delete_task(999);

        let events = log.read_events();
        let ops: Vec<_> = events.iter().map(|e| e["operation"].as_str().unwrap()).collect();
        assert_eq!(ops, ["create", "toggle", "delete"]);
        assert_eq!(events[1]["payload"]["spawned"]["dueDate"], "2024-01-08");
        assert!(events[2]["payload"]["error"].as_str().unwrap().contains("999"));
    }

    #[test]
    fn test_open_uses_config() {
        let dir = TempDir::new().unwrap();
        let config = TrackerConfig {
            first_id: 100,
            debug_logging: true,
            database: Some("store/tasks.sqlite3".into()),
        };
        config.save_to(dir.path()).unwrap();

        let tracker = Tracker::open(dir.path()).unwrap();
        let task = tracker.create_task(TaskDraft::new("Configured")).unwrap();

        assert_eq!(task.id, 100);
        assert_eq!(tracker.store().db_path(), dir.path().join("store/tasks.sqlite3"));
        let log = tracker.event_log().unwrap();
        assert_eq!(log.path(), dir.path().join("store/events.jsonl"));
        assert_eq!(log.read_events().len(), 1);
    }

    #[test]
    fn test_audit_log_passthrough() {
        let tracker = Tracker::new(InMemoryTaskStore::new());
        let task = tracker.create_task(TaskDraft::new("Audited")).unwrap();
        tracker.toggle_completion(task.id).unwrap();

        let log = tracker.audit_log(Some(task.id), None).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].operation, "complete");
    }
}
