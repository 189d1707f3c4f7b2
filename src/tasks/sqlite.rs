//! `SQLite` implementation of the task store.

use crate::error::{Error, Result};
use crate::paths::DATABASE_FILENAME;
use crate::tasks::id::IdAllocator;
use crate::tasks::models::{
    parse_date, AuditEntry, Priority, RecurrencePattern, Task, TaskDraft, TaskId,
};
use crate::tasks::store::{audit_json, audit_op, TaskStore, Transition};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a writer waits for another writer's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Columns selected whenever a task row is read, in `parse_task` order.
const TASK_COLUMNS: &str = "id, title, completed, priority, due_date, is_recurring, \
     recurrence_pattern, recurrence_end_date, related_tasks, details";

/// SQLite-based task store.
///
/// Every write runs inside an immediate transaction, so concurrent writers
/// (threads or processes) are serialized by the database lock. Ids come from
/// a sequence row in the database itself, so every handle on one file draws
/// from the same counter.
pub struct SqliteTaskStore {
    db_path: PathBuf,
    ids: IdSource,
}

enum IdSource {
    /// The database's `id_sequence` row, never below `floor`.
    Sequence { floor: TaskId },
    /// An injected allocator, used by tests to script ids.
    Allocator(Box<dyn IdAllocator>),
}

impl SqliteTaskStore {
    /// Open (or create) a store at the given database path.
    ///
    /// Ids continue after the highest id the database has handed out.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_first_id(db_path, 1)
    }

    /// Open a store whose ids never go below `first_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn open_with_first_id(db_path: impl AsRef<Path>, first_id: TaskId) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        init_schema(&open_connection(&db_path)?)?;
        Ok(Self { db_path, ids: IdSource::Sequence { floor: first_id } })
    }

    /// Open a store that draws ids from `ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn with_allocator(
        db_path: impl AsRef<Path>,
        ids: impl IdAllocator + 'static,
    ) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        init_schema(&open_connection(&db_path)?)?;
        Ok(Self { db_path, ids: IdSource::Allocator(Box::new(ids)) })
    }

    /// Open the store kept in a data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_dir(data_dir: &Path) -> Result<Self> {
        Self::new(data_dir.join(DATABASE_FILENAME))
    }

    /// Get the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        open_connection(&self.db_path)
    }

    /// Run `f` inside an immediate transaction, committing on success.
    fn write<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.open()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Draw the next id. Must run inside a write transaction.
    fn next_id(&self, conn: &Connection) -> Result<TaskId> {
        match &self.ids {
            IdSource::Sequence { floor } => next_sequence_id(conn, *floor),
            IdSource::Allocator(ids) => Ok(ids.allocate()),
        }
    }

    /// Log an operation to the audit log.
    fn log_audit(
        conn: &Connection,
        operation: &str,
        task_id: TaskId,
        old: Option<&Task>,
        new: Option<&Task>,
        details: Option<&str>,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO task_audit_log (operation, task_id, old_value, new_value, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                operation,
                task_id,
                old.map(audit_json).transpose()?,
                new.map(audit_json).transpose()?,
                details
            ],
        )?;
        Ok(())
    }

    fn fetch(conn: &Connection, id: TaskId) -> Result<Option<Task>> {
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                parse_task,
            )
            .optional()?;
        Ok(task)
    }

    fn insert(conn: &Connection, task: &Task) -> Result<()> {
        let related = serde_json::to_string(&task.related_tasks)?;
        conn.execute(
            "INSERT INTO tasks (id, title, completed, priority, due_date, is_recurring,
                                recurrence_pattern, recurrence_end_date, related_tasks, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.id,
                task.title,
                task.completed,
                task.priority.as_ref().map(Priority::as_str),
                task.due_date.map(format_date),
                task.is_recurring,
                task.recurrence_pattern.as_ref().map(RecurrencePattern::as_str),
                task.recurrence_end_date.map(format_date),
                related,
                task.details,
            ],
        )?;
        Ok(())
    }

    fn update_completed(conn: &Connection, old: &Task, completed: bool) -> Result<Task> {
        conn.execute("UPDATE tasks SET completed = ?1 WHERE id = ?2", params![completed, old.id])?;
        let new = Task { completed, ..old.clone() };
        let operation = audit_op::for_completion(completed);
        Self::log_audit(conn, operation, old.id, Some(old), Some(&new), None)?;
        Ok(new)
    }

    fn swap(conn: &Connection, old: &Task, new_task: Task) -> Result<Task> {
        if new_task.id != old.id && Self::fetch(conn, new_task.id)?.is_some() {
            return Err(Error::DuplicateId(new_task.id));
        }

        conn.execute("DELETE FROM tasks WHERE id = ?1", params![old.id])?;
        Self::insert(conn, &new_task)?;
        let details = format!("replaced by {}", new_task.id);
        Self::log_audit(
            conn,
            audit_op::REPLACE,
            old.id,
            Some(old),
            Some(&new_task),
            Some(&details),
        )?;
        Ok(new_task)
    }
}

impl std::fmt::Debug for SqliteTaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTaskStore").field("db_path", &self.db_path).finish_non_exhaustive()
    }
}

fn open_connection(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Live tasks; seq keeps insertion order across replacements
        CREATE TABLE IF NOT EXISTS tasks (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id INTEGER NOT NULL UNIQUE,
            title TEXT NOT NULL CHECK (length(trim(title)) > 0),
            completed INTEGER NOT NULL DEFAULT 0,
            priority TEXT
                CHECK (priority IS NULL OR priority IN ('urgent', 'important', 'remember', 'no-urgency')),
            due_date TEXT,
            is_recurring INTEGER NOT NULL DEFAULT 0,
            recurrence_pattern TEXT,
            recurrence_end_date TEXT,
            related_tasks TEXT NOT NULL DEFAULT '[]',
            details TEXT
        );

        -- Immutable audit log
        CREATE TABLE IF NOT EXISTS task_audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL DEFAULT (datetime('now')),
            operation TEXT NOT NULL,
            task_id INTEGER,
            old_value TEXT,
            new_value TEXT,
            details TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_task_audit_task_id ON task_audit_log(task_id);

        -- Next id to hand out, shared by every connection
        CREATE TABLE IF NOT EXISTS id_sequence (
            name TEXT PRIMARY KEY,
            next_id INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// Highest id that was ever live, judged from live rows and the audit log.
fn highest_known_id(conn: &Connection) -> Result<Option<TaskId>> {
    let highest = conn.query_row(
        "SELECT MAX(m) FROM (
             SELECT MAX(id) AS m FROM tasks
             UNION ALL
             SELECT MAX(task_id) AS m FROM task_audit_log
         )",
        [],
        |row| row.get(0),
    )?;
    Ok(highest)
}

/// Take the next id from the sequence row and advance it.
///
/// A database without the row (created before it existed) starts after
/// the highest id it has ever held. The result is never below `floor`.
fn next_sequence_id(conn: &Connection, floor: TaskId) -> Result<TaskId> {
    let stored: Option<TaskId> = conn
        .query_row("SELECT next_id FROM id_sequence WHERE name = 'tasks'", [], |row| row.get(0))
        .optional()?;
    let next = match stored {
        Some(next) => next,
        None => highest_known_id(conn)?.map_or(floor, |highest| highest.saturating_add(1)),
    }
    .max(floor);

    conn.execute(
        "INSERT OR REPLACE INTO id_sequence (name, next_id) VALUES ('tasks', ?1)",
        params![next.saturating_add(1)],
    )?;
    Ok(next)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a task from a row selected with `TASK_COLUMNS`.
fn parse_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let priority: Option<String> = row.get(3)?;
    let due_date: Option<String> = row.get(4)?;
    let pattern: Option<String> = row.get(6)?;
    let end_date: Option<String> = row.get(7)?;
    let related: String = row.get(8)?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        completed: row.get(2)?,
        priority: priority.and_then(|p| Priority::from_str(&p).ok()),
        due_date: due_date.and_then(|d| parse_date(&d).ok()),
        is_recurring: row.get(5)?,
        recurrence_pattern: pattern.map(|p| RecurrencePattern::parse(&p)),
        recurrence_end_date: end_date.and_then(|d| parse_date(&d).ok()),
        related_tasks: serde_json::from_str(&related).unwrap_or_default(),
        details: row.get(9)?,
    })
}

fn parse_audit_entry(row: &rusqlite::Row) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        operation: row.get(2)?,
        task_id: row.get(3)?,
        old_value: row.get(4)?,
        new_value: row.get(5)?,
        details: row.get(6)?,
    })
}

impl TaskStore for SqliteTaskStore {
    fn allocate_id(&self) -> Result<TaskId> {
        self.write(|conn| self.next_id(conn))
    }

    fn create(&self, draft: TaskDraft) -> Result<Task> {
        draft.validate()?;

        self.write(|conn| {
            let id = self.next_id(conn)?;
            if Self::fetch(conn, id)?.is_some() {
                return Err(Error::DuplicateId(id));
            }
            let task = draft.into_task(id);
            Self::insert(conn, &task)?;
            Self::log_audit(conn, audit_op::CREATE, id, None, Some(&task), None)?;
            Ok(task)
        })
    }

    fn find(&self, id: TaskId) -> Result<Option<Task>> {
        let conn = self.open()?;
        Self::fetch(&conn, id)
    }

    fn remove(&self, id: TaskId) -> Result<Task> {
        self.write(|conn| {
            let task = Self::fetch(conn, id)?.ok_or(Error::NotFound(id))?;
            conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            Self::log_audit(conn, audit_op::REMOVE, id, Some(&task), None, None)?;
            Ok(task)
        })
    }

    fn replace(&self, id: TaskId, new_task: Task) -> Result<Task> {
        TaskDraft::from(new_task.clone()).validate()?;

        self.write(|conn| {
            let old = Self::fetch(conn, id)?.ok_or(Error::NotFound(id))?;
            Self::swap(conn, &old, new_task)
        })
    }

    fn set_completed(&self, id: TaskId, completed: bool) -> Result<Task> {
        self.write(|conn| {
            let old = Self::fetch(conn, id)?.ok_or(Error::NotFound(id))?;
            Self::update_completed(conn, &old, completed)
        })
    }

    fn transition(
        &self,
        id: TaskId,
        decide: &dyn Fn(&Task) -> Result<Transition>,
    ) -> Result<(Task, Task)> {
        self.write(|conn| {
            let old = Self::fetch(conn, id)?.ok_or(Error::NotFound(id))?;
            let live = match decide(&old)? {
                Transition::SetCompleted(completed) => {
                    Self::update_completed(conn, &old, completed)?
                }
                Transition::Succeed(successor) => {
                    successor.validate()?;
                    let next = successor.into_task(self.next_id(conn)?);
                    Self::swap(conn, &old, next)?
                }
            };
            Ok((old, live))
        })
    }

    fn list(&self) -> Result<Vec<Task>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY seq ASC"))?;
        let tasks = stmt.query_map([], parse_task)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    fn get_audit_log(
        &self,
        task_id: Option<TaskId>,
        limit: Option<usize>,
    ) -> Result<Vec<AuditEntry>> {
        let conn = self.open()?;

        let where_clause = if task_id.is_some() { "WHERE task_id = ?1" } else { "" };
        let limit_clause = limit.map(|n| format!("LIMIT {n}")).unwrap_or_default();
        let sql = format!(
            "SELECT id, timestamp, operation, task_id, old_value, new_value, details
             FROM task_audit_log {where_clause}
             ORDER BY id DESC {limit_clause}"
        );

        let mut stmt = conn.prepare(&sql)?;
        let entries: rusqlite::Result<Vec<AuditEntry>> = match task_id {
            Some(id) => stmt.query_map(params![id], parse_audit_entry)?.collect(),
            None => stmt.query_map([], parse_audit_entry)?.collect(),
        };
        Ok(entries?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::models::RecurrencePattern;
    use crate::testing::ScriptedIds;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, SqliteTaskStore) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("tasks.sqlite3");
        let store = SqliteTaskStore::new(&db_path).unwrap();
        (dir, store)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_create_and_find_task() {
        let (_dir, store) = create_test_store();

        let draft = TaskDraft::new("Water plants")
            .priority(Priority::Remember)
            .due(date(2024, 1, 31))
            .recurring(RecurrencePattern::Monthly)
            .until(date(2024, 2, 29))
            .related([4, 2])
            .details("Balcony first");
        let task = store.create(draft).unwrap();

        assert_eq!(task.id, 1);
        let found = store.find(task.id).unwrap().unwrap();
        assert_eq!(found, task);
    }

    #[test]
    fn test_find_nonexistent_task() {
        let (_dir, store) = create_test_store();
        assert!(store.find(12).unwrap().is_none());
    }

    #[test]
    fn test_create_invalid_draft_stores_nothing() {
        let (_dir, store) = create_test_store();
        let result = store.create(TaskDraft::new("Bad").recurring(RecurrencePattern::Daily));

        assert!(matches!(result, Err(Error::InvalidRecurrenceConfig(_))));
        assert!(store.list().unwrap().is_empty());
        assert!(store.get_audit_log(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_create_duplicate_id() {
        let dir = TempDir::new().unwrap();
        let store =
            SqliteTaskStore::with_allocator(dir.path().join("t.sqlite3"), ScriptedIds::new([3, 3]))
                .unwrap();
        store.create(TaskDraft::new("One")).unwrap();
        assert!(matches!(store.create(TaskDraft::new("Two")), Err(Error::DuplicateId(3))));
    }

    #[test]
    fn test_remove_task() {
        let (_dir, store) = create_test_store();
        let task = store.create(TaskDraft::new("To delete")).unwrap();

        assert_eq!(store.remove(task.id).unwrap().id, task.id);
        assert!(store.find(task.id).unwrap().is_none());
        assert!(matches!(store.remove(task.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_replace_is_atomic_and_appends() {
        let (_dir, store) = create_test_store();
        let first = store.create(TaskDraft::new("First")).unwrap();
        let second = store.create(TaskDraft::new("Second")).unwrap();

        let successor = Task { id: store.allocate_id().unwrap(), ..first.clone() };
        store.replace(first.id, successor.clone()).unwrap();

        let ids: Vec<_> = store.list().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, [second.id, successor.id]);
    }

    #[test]
    fn test_replace_conflict_rolls_back() {
        let (_dir, store) = create_test_store();
        let a = store.create(TaskDraft::new("A")).unwrap();
        let b = store.create(TaskDraft::new("B")).unwrap();

        let clash = Task { id: b.id, ..a.clone() };
        assert!(matches!(store.replace(a.id, clash), Err(Error::DuplicateId(_))));
        assert_eq!(store.list().unwrap(), vec![a, b]);
    }

    #[test]
    fn test_replace_missing() {
        let (_dir, store) = create_test_store();
        let orphan = TaskDraft::new("Orphan").into_task(10);
        assert!(matches!(store.replace(1, orphan), Err(Error::NotFound(1))));
    }

    #[test]
    fn test_set_completed() {
        let (_dir, store) = create_test_store();
        let task = store.create(TaskDraft::new("Flip")).unwrap();

        assert!(store.set_completed(task.id, true).unwrap().completed);
        assert!(store.find(task.id).unwrap().unwrap().completed);
        assert!(matches!(store.set_completed(99, true), Err(Error::NotFound(99))));
    }

    #[test]
    fn test_ids_resume_after_reopen() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("tasks.sqlite3");

        {
            let store = SqliteTaskStore::new(&db_path).unwrap();
            store.create(TaskDraft::new("One")).unwrap();
            let two = store.create(TaskDraft::new("Two")).unwrap();
            store.remove(two.id).unwrap();
        }

        // Id 2 was deleted but is remembered by the audit log
        let store = SqliteTaskStore::new(&db_path).unwrap();
        assert_eq!(store.create(TaskDraft::new("Three")).unwrap().id, 3);
    }

    #[test]
    fn test_first_id_floor() {
        let dir = TempDir::new().unwrap();
        let store = SqliteTaskStore::open_with_first_id(dir.path().join("t.sqlite3"), 1000).unwrap();
        assert_eq!(store.create(TaskDraft::new("Big")).unwrap().id, 1000);
    }

    #[test]
    fn test_handles_share_id_sequence() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("tasks.sqlite3");
        let a = SqliteTaskStore::new(&db_path).unwrap();
        let b = SqliteTaskStore::new(&db_path).unwrap();

        assert_eq!(a.create(TaskDraft::new("from a")).unwrap().id, 1);
        assert_eq!(b.create(TaskDraft::new("from b")).unwrap().id, 2);
        assert_eq!(a.allocate_id().unwrap(), 3);
        assert_eq!(b.create(TaskDraft::new("b again")).unwrap().id, 4);
    }

    #[test]
    fn test_spawn_through_other_handle_gets_fresh_id() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("tasks.sqlite3");
        let a = SqliteTaskStore::new(&db_path).unwrap();
        let b = SqliteTaskStore::new(&db_path).unwrap();

        let chain = a
            .create(TaskDraft::new("Chain").due(date(2024, 1, 1)).recurring(RecurrencePattern::Daily))
            .unwrap();
        let other = b.create(TaskDraft::new("Other")).unwrap();

        let (_, next) = a
            .transition(chain.id, &|t| Ok(Transition::Succeed(TaskDraft::from(t.clone()))))
            .unwrap();
        assert_eq!(next.id, 3);
        let ids: Vec<_> = b.list().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, [other.id, next.id]);
    }

    #[test]
    fn test_transition_error_rolls_back() {
        let (_dir, store) = create_test_store();
        let task = store.create(TaskDraft::new("Keep")).unwrap();

        let result = store.transition(task.id, &|_| Err(Error::InvalidTask("refused".to_string())));
        assert!(matches!(result, Err(Error::InvalidTask(_))));
        assert_eq!(store.find(task.id).unwrap().unwrap(), task);
        assert_eq!(store.get_audit_log(None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_in_dir() {
        let dir = TempDir::new().unwrap();
        let store = SqliteTaskStore::in_dir(dir.path()).unwrap();
        assert_eq!(store.db_path(), dir.path().join(DATABASE_FILENAME));
        assert!(store.db_path().exists());
    }

    #[test]
    fn test_unknown_pattern_survives_storage() {
        let (_dir, store) = create_test_store();
        let pattern = RecurrencePattern::parse("Quarterly");
        let draft = TaskDraft::new("Odd").due(date(2024, 1, 1)).recurring(pattern.clone());
        let task = store.create(draft).unwrap();

        let found = store.find(task.id).unwrap().unwrap();
        assert_eq!(found.recurrence_pattern, Some(pattern));
        assert_eq!(found.recurrence_pattern.unwrap().as_str(), "Quarterly");
    }

    #[test]
    fn test_audit_log() {
        let (_dir, store) = create_test_store();
        let task = store.create(TaskDraft::new("Audited")).unwrap();
        store.set_completed(task.id, true).unwrap();
        store.remove(task.id).unwrap();

        let log = store.get_audit_log(None, None).unwrap();
        let ops: Vec<_> = log.iter().map(|e| e.operation.as_str()).collect();
        assert_eq!(ops, ["remove", "complete", "create"]);
    }

    #[test]
    fn test_audit_log_filtered_and_limited() {
        let (_dir, store) = create_test_store();
        let a = store.create(TaskDraft::new("A")).unwrap();
        let b = store.create(TaskDraft::new("B")).unwrap();
        store.set_completed(a.id, true).unwrap();
        store.set_completed(a.id, false).unwrap();

        assert_eq!(store.get_audit_log(Some(b.id), None).unwrap().len(), 1);
        let latest = store.get_audit_log(Some(a.id), Some(1)).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].operation, "reopen");
        assert_eq!(store.get_audit_log(None, Some(2)).unwrap().len(), 2);
    }
}
