//! Path utilities for determining data storage locations.
//!
//! Data lives in the per-user data directory (for example
//! `~/.local/share/recurring-tasks/` on Linux) unless the project config
//! names a database explicitly.

use crate::config::TrackerConfig;
use std::path::{Path, PathBuf};

/// The directory name for recurring-tasks data.
const DATA_DIR_NAME: &str = "recurring-tasks";

/// The database filename.
pub const DATABASE_FILENAME: &str = "tasks.sqlite3";

/// The debug event log filename, kept next to the database.
pub const EVENTS_FILENAME: &str = "events.jsonl";

/// Get the base data directory.
///
/// Returns `None` if the platform data directory cannot be determined.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(DATA_DIR_NAME))
}

/// Get the database path for a project.
///
/// A `database` entry in the config wins; a relative one is resolved against
/// `base_dir`. Otherwise the database lives in [`data_dir`].
#[must_use]
pub fn database_path(config: &TrackerConfig, base_dir: &Path) -> Option<PathBuf> {
    match &config.database {
        Some(path) if path.is_absolute() => Some(path.clone()),
        Some(path) => Some(base_dir.join(path)),
        None => data_dir().map(|dir| dir.join(DATABASE_FILENAME)),
    }
}

/// Get the event log path that belongs to a database.
#[must_use]
pub fn events_path(db_path: &Path) -> PathBuf {
    db_path.parent().unwrap_or_else(|| Path::new(".")).join(EVENTS_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_path_relative_override() {
        let config = TrackerConfig { database: Some("db/tasks.db".into()), ..Default::default() };
        let path = database_path(&config, Path::new("/projects/home")).unwrap();
        assert_eq!(path, PathBuf::from("/projects/home/db/tasks.db"));
    }

    #[test]
    fn test_database_path_absolute_override() {
        let config = TrackerConfig { database: Some("/var/tasks.db".into()), ..Default::default() };
        let path = database_path(&config, Path::new("/projects/home")).unwrap();
        assert_eq!(path, PathBuf::from("/var/tasks.db"));
    }

    #[test]
    fn test_database_path_default_in_data_dir() {
        if let Some(path) = database_path(&TrackerConfig::default(), Path::new(".")) {
            assert!(path.ends_with("recurring-tasks/tasks.sqlite3"));
        }
    }

    #[test]
    fn test_events_path_next_to_database() {
        assert_eq!(
            events_path(Path::new("/data/tasks.sqlite3")),
            PathBuf::from("/data/events.jsonl")
        );
    }
}
