//! Task tracking with recurring occurrences.
//!
//! This module provides:
//! - Tasks with a title, optional priority, due date and related tasks
//! - Recurrence rules (daily, weekly, monthly, yearly) with an optional end date
//! - Stores that own the live task collection, in memory or in `SQLite`
//! - A completion state machine that retires a recurring occurrence and
//!   spawns its successor in one step
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use recurring_tasks::tasks::{
//!     CompletionStateMachine, InMemoryTaskStore, RecurrencePattern, TaskDraft, TaskStore,
//! };
//!
//! let machine = CompletionStateMachine::new(InMemoryTaskStore::new());
//! let due = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
//! let task = machine
//!     .store()
//!     .create(TaskDraft::new("Water plants").due(due).recurring(RecurrencePattern::Monthly))
//!     .unwrap();
//!
//! let next = machine.toggle_completion(task.id).unwrap();
//! assert_eq!(next.due_date, NaiveDate::from_ymd_opt(2024, 2, 29));
//! ```

pub mod bulk;
pub mod completion;
pub mod id;
pub mod models;
pub mod recurrence;
pub mod sqlite;
pub mod store;

pub use completion::{plan_toggle, successor_due_date, CompletionStateMachine, ToggleOutcome};
pub use id::{IdAllocator, SequentialIds};
pub use models::{
    parse_date, AuditEntry, InvalidPriority, OccurrenceState, Priority, RecurrencePattern, Task,
    TaskDraft, TaskId,
};
pub use recurrence::next_due_date;
pub use sqlite::SqliteTaskStore;
pub use store::{InMemoryTaskStore, TaskStore, Transition};
