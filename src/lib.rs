//! # `recurring_tasks`
//!
//! A task tracker where completing a recurring task retires the finished
//! occurrence and puts the next one in its place.
//!
//! The core lives in [`tasks`]: the task model, the occurrence calculator,
//! the stores and the completion state machine. [`tracker::Tracker`] bundles
//! them with configuration and debug event logging for user interfaces.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod event_log;
pub mod paths;
pub mod tasks;
pub mod testing;
pub mod tracker;

pub use error::{Error, Result};
pub use tracker::Tracker;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
