//! Task store trait and in-memory implementation.

use crate::error::{Error, Result};
use crate::tasks::id::{IdAllocator, SequentialIds};
use crate::tasks::models::{AuditEntry, Task, TaskDraft, TaskId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What to do with a task that [`TaskStore::transition`] has just read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Set the task's `completed` flag in place.
    SetCompleted(bool),
    /// Retire the task and insert `successor` in its place under a freshly
    /// allocated id.
    Succeed(TaskDraft),
}

/// Trait for task storage operations.
///
/// Every method is indivisible: no caller can observe a state halfway
/// through one. Callers get owned copies of tasks, never references into the
/// store.
#[allow(clippy::missing_errors_doc)]
pub trait TaskStore {
    /// Reserve a fresh id from the store's allocator.
    fn allocate_id(&self) -> Result<TaskId>;

    /// Validate a draft, give it a fresh id and insert it as an active task.
    fn create(&self, draft: TaskDraft) -> Result<Task>;

    /// Get a task by ID.
    fn find(&self, id: TaskId) -> Result<Option<Task>>;

    /// Delete a task by ID, returning the removed task.
    fn remove(&self, id: TaskId) -> Result<Task>;

    /// Remove the task at `id` and insert `new_task` in one step.
    ///
    /// `new_task` may carry a different id, which must not already be live.
    /// The new task is appended at the end of the listing order.
    fn replace(&self, id: TaskId, new_task: Task) -> Result<Task>;

    /// Set a task's completion flag in place.
    fn set_completed(&self, id: TaskId, completed: bool) -> Result<Task>;

    /// Read task `id`, let `decide` choose a [`Transition`] and apply it.
    ///
    /// Nothing else can write between the read and the write. Returns the
    /// task as read and the task that is live afterwards. An error from
    /// `decide` leaves the store untouched.
    fn transition(
        &self,
        id: TaskId,
        decide: &dyn Fn(&Task) -> Result<Transition>,
    ) -> Result<(Task, Task)>;

    /// List all tasks in insertion order.
    fn list(&self) -> Result<Vec<Task>>;

    /// Get audit log entries, newest first, optionally filtered by task ID.
    fn get_audit_log(&self, task_id: Option<TaskId>, limit: Option<usize>)
        -> Result<Vec<AuditEntry>>;
}

impl<T: TaskStore + ?Sized> TaskStore for Arc<T> {
    fn allocate_id(&self) -> Result<TaskId> {
        (**self).allocate_id()
    }

    fn create(&self, draft: TaskDraft) -> Result<Task> {
        (**self).create(draft)
    }

    fn find(&self, id: TaskId) -> Result<Option<Task>> {
        (**self).find(id)
    }

    fn remove(&self, id: TaskId) -> Result<Task> {
        (**self).remove(id)
    }

    fn replace(&self, id: TaskId, new_task: Task) -> Result<Task> {
        (**self).replace(id, new_task)
    }

    fn set_completed(&self, id: TaskId, completed: bool) -> Result<Task> {
        (**self).set_completed(id, completed)
    }

    fn transition(
        &self,
        id: TaskId,
        decide: &dyn Fn(&Task) -> Result<Transition>,
    ) -> Result<(Task, Task)> {
        (**self).transition(id, decide)
    }

    fn list(&self) -> Result<Vec<Task>> {
        (**self).list()
    }

    fn get_audit_log(
        &self,
        task_id: Option<TaskId>,
        limit: Option<usize>,
    ) -> Result<Vec<AuditEntry>> {
        (**self).get_audit_log(task_id, limit)
    }
}

/// Audit operation names shared by the store implementations.
pub(crate) mod audit_op {
    pub const CREATE: &str = "create";
    pub const REMOVE: &str = "remove";
    pub const REPLACE: &str = "replace";
    pub const COMPLETE: &str = "complete";
    pub const REOPEN: &str = "reopen";

    pub const fn for_completion(completed: bool) -> &'static str {
        if completed {
            COMPLETE
        } else {
            REOPEN
        }
    }
}

/// Serialize a task for the audit log.
pub(crate) fn audit_json(task: &Task) -> Result<String> {
    Ok(serde_json::to_string(task)?)
}

#[derive(Debug, Default)]
struct StoreState {
    tasks: Vec<Task>,
    audit: Vec<AuditEntry>,
}

impl StoreState {
    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    fn index_of(&self, id: TaskId) -> Result<usize> {
        self.position(id).ok_or(Error::NotFound(id))
    }

    /// Build the next audit entry. Serialization happens here, before the
    /// caller mutates anything.
    fn audit_entry(
        &self,
        operation: &str,
        task_id: TaskId,
        old: Option<&Task>,
        new: Option<&Task>,
        details: Option<String>,
    ) -> Result<AuditEntry> {
        Ok(AuditEntry {
            id: i64::try_from(self.audit.len()).map_or(i64::MAX, |n| n + 1),
            timestamp: chrono::Utc::now().to_rfc3339(),
            operation: operation.to_string(),
            task_id: Some(task_id),
            old_value: old.map(audit_json).transpose()?,
            new_value: new.map(audit_json).transpose()?,
            details,
        })
    }

    fn set_completed(&mut self, id: TaskId, completed: bool) -> Result<Task> {
        let index = self.index_of(id)?;
        let old = &self.tasks[index];
        let new = Task { completed, ..old.clone() };
        let entry =
            self.audit_entry(audit_op::for_completion(completed), id, Some(old), Some(&new), None)?;

        self.tasks[index] = new.clone();
        self.audit.push(entry);
        Ok(new)
    }

    fn replace(&mut self, id: TaskId, new_task: Task) -> Result<Task> {
        let index = self.index_of(id)?;
        if new_task.id != id && self.position(new_task.id).is_some() {
            return Err(Error::DuplicateId(new_task.id));
        }
        let entry = self.audit_entry(
            audit_op::REPLACE,
            id,
            Some(&self.tasks[index]),
            Some(&new_task),
            Some(format!("replaced by {}", new_task.id)),
        )?;

        self.tasks.remove(index);
        self.tasks.push(new_task.clone());
        self.audit.push(entry);
        Ok(new_task)
    }
}

/// Task store holding everything in memory behind a single lock.
pub struct InMemoryTaskStore {
    ids: Box<dyn IdAllocator>,
    state: Mutex<StoreState>,
}

impl InMemoryTaskStore {
    /// Create an empty store with ids counting up from 1.
    #[must_use]
    pub fn new() -> Self {
        Self::with_allocator(SequentialIds::default())
    }

    /// Create an empty store that draws ids from `ids`.
    #[must_use]
    pub fn with_allocator(ids: impl IdAllocator + 'static) -> Self {
        Self { ids: Box::new(ids), state: Mutex::new(StoreState::default()) }
    }

    /// Number of live tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Whether the store holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // Every mutation completes before the guard drops, so a poisoned
        // lock still guards a consistent collection.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryTaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTaskStore").field("tasks", &self.len()).finish_non_exhaustive()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn allocate_id(&self) -> Result<TaskId> {
        Ok(self.ids.allocate())
    }

    fn create(&self, draft: TaskDraft) -> Result<Task> {
        draft.validate()?;

        let mut state = self.lock();
        let id = self.ids.allocate();
        if state.position(id).is_some() {
            return Err(Error::DuplicateId(id));
        }

        let task = draft.into_task(id);
        let entry = state.audit_entry(audit_op::CREATE, id, None, Some(&task), None)?;
        state.tasks.push(task.clone());
        state.audit.push(entry);
        Ok(task)
    }

    fn find(&self, id: TaskId) -> Result<Option<Task>> {
        let state = self.lock();
        Ok(state.position(id).map(|i| state.tasks[i].clone()))
    }

    fn remove(&self, id: TaskId) -> Result<Task> {
        let mut state = self.lock();
        let index = state.index_of(id)?;
        let entry = state.audit_entry(audit_op::REMOVE, id, Some(&state.tasks[index]), None, None)?;
        let task = state.tasks.remove(index);
        state.audit.push(entry);
        Ok(task)
    }

    fn replace(&self, id: TaskId, new_task: Task) -> Result<Task> {
        TaskDraft::from(new_task.clone()).validate()?;
        self.lock().replace(id, new_task)
    }

    fn set_completed(&self, id: TaskId, completed: bool) -> Result<Task> {
        self.lock().set_completed(id, completed)
    }

    fn transition(
        &self,
        id: TaskId,
        decide: &dyn Fn(&Task) -> Result<Transition>,
    ) -> Result<(Task, Task)> {
        let mut state = self.lock();
        let old = state.tasks[state.index_of(id)?].clone();

        let live = match decide(&old)? {
            Transition::SetCompleted(completed) => state.set_completed(id, completed)?,
            Transition::Succeed(successor) => {
                successor.validate()?;
                let next = successor.into_task(self.ids.allocate());
                state.replace(id, next)?
            }
        };
        Ok((old, live))
    }

    fn list(&self) -> Result<Vec<Task>> {
        Ok(self.lock().tasks.clone())
    }

    fn get_audit_log(
        &self,
        task_id: Option<TaskId>,
        limit: Option<usize>,
    ) -> Result<Vec<AuditEntry>> {
        let state = self.lock();
        let entries = state
            .audit
            .iter()
            .rev()
            .filter(|e| task_id.map_or(true, |id| e.task_id == Some(id)))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(entries)
    }
}
