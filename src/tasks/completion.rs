//! Completion toggling for plain and recurring tasks.
//!
//! Toggling a plain task flips its `completed` flag. Completing an active
//! recurring task instead retires that occurrence and puts its successor in
//! its place, unless the successor would fall past the recurrence end date,
//! in which case the occurrence is simply marked done and kept. Re-opening a
//! completed recurring task is a plain flip and never undoes an earlier spawn.

use crate::error::{RecurrenceConfigError, Result};
use crate::tasks::models::{Task, TaskDraft, TaskId};
use crate::tasks::recurrence::{next_due_date, within_boundary};
use crate::tasks::store::{TaskStore, Transition};
use chrono::NaiveDate;

/// What a toggle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The task's `completed` flag was flipped in place.
    Flipped(Task),
    /// A recurring occurrence was completed and replaced by its successor.
    Spawned {
        /// The completed occurrence, no longer in the store.
        retired: Task,
        /// The new active occurrence.
        next: Task,
    },
    /// A recurring occurrence was completed and its chain has no successor.
    ChainEnded(Task),
}

impl ToggleOutcome {
    /// The task that is live in the store after the toggle.
    #[must_use]
    pub const fn task(&self) -> &Task {
        match self {
            Self::Flipped(task) | Self::ChainEnded(task) => task,
            Self::Spawned { next, .. } => next,
        }
    }

    /// Consume the outcome, keeping the live task.
    #[must_use]
    pub fn into_task(self) -> Task {
        match self {
            Self::Flipped(task) | Self::ChainEnded(task) => task,
            Self::Spawned { next, .. } => next,
        }
    }
}

/// Due date of the occurrence that follows `task`, if its chain allows one.
///
/// Returns `Ok(None)` when the successor would fall after the recurrence end
/// date.
///
/// # Errors
///
/// Returns [`InvalidRecurrenceConfig`](crate::Error::InvalidRecurrenceConfig)
/// if `task` has no due date to advance from.
pub fn successor_due_date(task: &Task) -> Result<Option<NaiveDate>> {
    let due = task.due_date.ok_or(RecurrenceConfigError::MissingDueDate)?;
    let next_due = next_due_date(due, task.recurrence_pattern.as_ref());
    Ok(within_boundary(next_due, task.recurrence_end_date).then_some(next_due))
}

/// Decide what toggling `task` does.
///
/// # Errors
///
/// Same as [`successor_due_date`] for an active recurring task.
pub fn plan_toggle(task: &Task) -> Result<Transition> {
    if !task.is_recurring || task.completed {
        return Ok(Transition::SetCompleted(!task.completed));
    }

    let plan = match successor_due_date(task)? {
        Some(next_due) => Transition::Succeed(TaskDraft {
            due_date: Some(next_due),
            ..TaskDraft::from(task.clone())
        }),
        None => Transition::SetCompleted(true),
    };
    Ok(plan)
}

/// Toggles task completion over a [`TaskStore`].
///
/// Each toggle is a single [`TaskStore::transition`], so the read, the
/// decision and the write happen under the store's own lock or transaction.
/// Toggles from separate machines sharing one database never interleave.
#[derive(Debug)]
pub struct CompletionStateMachine<S> {
    store: S,
}

impl<S: TaskStore> CompletionStateMachine<S> {
    /// Create a state machine over `store`.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Consume the machine, returning the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Toggle the completion of task `id` and return the task that is live
    /// afterwards: the flipped task, the spawned successor, or the final
    /// occurrence of an ended chain.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`](crate::Error::NotFound) for an unknown id and
    /// [`InvalidRecurrenceConfig`](crate::Error::InvalidRecurrenceConfig) for
    /// a recurring task without a due date. Store errors are propagated.
    pub fn toggle_completion(&self, id: TaskId) -> Result<Task> {
        self.toggle(id).map(ToggleOutcome::into_task)
    }

    /// Toggle the completion of task `id`, reporting what happened.
    ///
    /// # Errors
    ///
    /// Same as [`Self::toggle_completion`].
    pub fn toggle(&self, id: TaskId) -> Result<ToggleOutcome> {
        let (before, live) = self.store.transition(id, &plan_toggle)?;

        let outcome = if live.id != before.id {
            ToggleOutcome::Spawned { retired: Task { completed: true, ..before }, next: live }
        } else if before.is_recurring && !before.completed {
            ToggleOutcome::ChainEnded(live)
        } else {
            ToggleOutcome::Flipped(live)
        };
        Ok(outcome)
    }
}
