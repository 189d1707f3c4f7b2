//! Testing utilities.
//!
//! These types are provided for use in tests. They may appear unused in
//! the library itself but are consumed by unit and integration tests.

use crate::tasks::{IdAllocator, TaskId};
use std::collections::VecDeque;
use std::sync::Mutex;

/// An id allocator that hands out a fixed script of ids.
///
/// Once the script runs out it counts up from one past the largest scripted
/// id. Scripts may repeat ids, which is how tests provoke collisions.
#[derive(Debug)]
pub struct ScriptedIds {
    script: Mutex<VecDeque<TaskId>>,
    after: Mutex<TaskId>,
}

impl ScriptedIds {
    /// Create an allocator that returns `ids` in order.
    #[must_use]
    pub fn new(ids: impl IntoIterator<Item = TaskId>) -> Self {
        let script: VecDeque<TaskId> = ids.into_iter().collect();
        let after = script.iter().max().map_or(1, |max| max + 1);
        Self { script: Mutex::new(script), after: Mutex::new(after) }
    }
}

impl IdAllocator for ScriptedIds {
    fn allocate(&self) -> TaskId {
        let mut script = self.script.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(id) = script.pop_front() {
            return id;
        }
        let mut after = self.after.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let id = *after;
        *after += 1;
        id
    }
}
