//! Task id allocation.
//!
//! Stores never invent ids themselves. They ask an [`IdAllocator`], which
//! makes id strategy injectable: a counter for ordinary use, a scripted
//! sequence in tests.

use crate::tasks::models::TaskId;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of task ids.
///
/// Implementations must not hand out the same id twice during their
/// lifetime. Stores additionally reject an id that is already live.
pub trait IdAllocator: Send + Sync {
    /// Produce the next id.
    fn allocate(&self) -> TaskId;
}

/// Monotonic counter allocator.
///
/// The counter stops at `i64::MAX` instead of wrapping around; a store then
/// rejects the repeated id as a duplicate.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicI64,
}

impl SequentialIds {
    /// Create an allocator whose first id is `first`.
    #[must_use]
    pub const fn starting_at(first: TaskId) -> Self {
        Self { next: AtomicI64::new(first) }
    }

    /// Peek at the id the next call to `allocate` returns.
    #[must_use]
    pub fn peek(&self) -> TaskId {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdAllocator for SequentialIds {
    fn allocate(&self) -> TaskId {
        let bumped = self.next.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            Some(n.saturating_add(1))
        });
        bumped.unwrap_or_else(|current| current)
    }
}
