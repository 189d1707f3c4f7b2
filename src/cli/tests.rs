//! Tests for the CLI module.

use super::*;
use crate::config::TrackerConfig;
use clap::Parser;
use std::process::ExitCode;
use tempfile::TempDir;

/// A project directory whose database lives inside it.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let config = TrackerConfig { database: Some("tasks.sqlite3".into()), ..Default::default() };
    config.save_to(dir.path()).unwrap();
    dir
}

/// An `add` command with the given `(flag, value)` options.
fn add(title: &str, options: &[(&str, &str)]) -> Command {
    let option = |flag: &str| {
        options.iter().find(|(name, _)| *name == flag).map(|(_, value)| (*value).to_string())
    };
    Command::Add {
        title: title.to_string(),
        due: option("due"),
        every: option("every"),
        until: option("until"),
        priority: option("priority"),
        details: option("details"),
        related: vec![],
    }
}

fn list_json(dir: &TempDir) -> Vec<serde_json::Value> {
    let output = run(Command::List { json: true }, dir.path());
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    serde_json::from_str(&output.stdout[0]).unwrap()
}

#[test]
fn test_parse_add_command() {
    let cli = Cli::parse_from([
        "recurring-tasks",
        "add",
        "Water plants",
        "--due",
        "2024-01-31",
        "--every",
        "monthly",
        "--related",
        "3,4",
    ]);
    let Command::Add { title, due, every, related, .. } = cli.command else {
        panic!("expected an add command");
    };
    assert_eq!(title, "Water plants");
    assert_eq!(due.as_deref(), Some("2024-01-31"));
    assert_eq!(every.as_deref(), Some("monthly"));
    assert_eq!(related, [3, 4]);
}

#[test]
fn test_parse_audit_log_command() {
    let cli = Cli::parse_from(["recurring-tasks", "audit-log", "--task", "5", "--limit", "2"]);
    assert!(matches!(cli.command, Command::AuditLog { task: Some(5), limit: Some(2) }));
}

#[test]
fn test_run_version() {
    let output = run(Command::Version, std::path::Path::new("."));
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    assert!(output.stdout[0].contains(crate::VERSION));
}

#[test]
fn test_add_and_list() {
    let dir = project();
    let output = run(
        add("Call plumber", &[("priority", "urgent"), ("due", "2024-05-01")]),
        dir.path(),
    );
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    assert_eq!(output.stdout[0], "Created #1 Call plumber (due 2024-05-01) [urgent]");

    let output = run(Command::List { json: false }, dir.path());
    assert_eq!(output.stdout, ["[ ] #1 Call plumber (due 2024-05-01) [urgent]"]);
}

#[test]
fn test_list_empty() {
    let dir = project();
    let output = run(Command::List { json: false }, dir.path());
    assert_eq!(output.stdout, ["No tasks"]);
}

#[test]
fn test_add_rejects_bad_input() {
    let dir = project();

    let output = run(add("x", &[("priority", "asap")]), dir.path());
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr[0].contains("asap"));

    let output = run(add("x", &[("every", "hourly")]), dir.path());
    assert!(output.stderr[0].contains("hourly"));

    let output = run(add("x", &[("due", "2024-13-01")]), dir.path());
    assert!(output.stderr[0].contains("invalid date"));

    let output = run(add("  ", &[]), dir.path());
    assert!(output.stderr[0].contains("title"));

    assert!(list_json(&dir).is_empty());
}

#[test]
fn test_add_recurring_without_due_uses_today() {
    let dir = project();
    let output = run(add("Gym", &[("every", "weekly")]), dir.path());
    assert_eq!(output.exit_code, ExitCode::SUCCESS);

    let tasks = list_json(&dir);
    let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    assert_eq!(tasks[0]["dueDate"], today.as_str());
    assert_eq!(tasks[0]["recurrencePattern"], "Weekly");
}

#[test]
fn test_toggle_recurring_spawns_next() {
    let dir = project();
    run(
        add("Water plants", &[("due", "2024-01-31"), ("every", "monthly"), ("until", "2024-03-31")]),
        dir.path(),
    );

    let output = run(Command::Toggle { id: 1 }, dir.path());
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    assert_eq!(
        output.stdout[0],
        "Completed #1; next occurrence #2 Water plants (due 2024-02-29, monthly until 2024-03-31)"
    );

    let tasks = list_json(&dir);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], 2);
}

#[test]
fn test_toggle_plain_and_reopen() {
    let dir = project();
    run(add("Buy milk", &[]), dir.path());

    let output = run(Command::Toggle { id: 1 }, dir.path());
    assert!(output.stdout[0].starts_with("Completed #1"));
    let output = run(Command::Toggle { id: 1 }, dir.path());
    assert!(output.stdout[0].starts_with("Reopened #1"));
}

#[test]
fn test_toggle_chain_end() {
    let dir = project();
    run(
        add("Once", &[("due", "2024-01-01"), ("every", "daily"), ("until", "2024-01-01")]),
        dir.path(),
    );

    let output = run(Command::Toggle { id: 1 }, dir.path());
    assert!(output.stdout[0].ends_with("(recurrence ended)"));
    assert_eq!(list_json(&dir)[0]["completed"], true);
}

#[test]
fn test_delete_and_missing_ids() {
    let dir = project();
    run(add("Temporary", &[]), dir.path());

    let output = run(Command::Delete { id: 1 }, dir.path());
    assert_eq!(output.stdout, ["Deleted #1"]);

    let output = run(Command::Delete { id: 1 }, dir.path());
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr[0].contains("not found"));

    let output = run(Command::Toggle { id: 1 }, dir.path());
    assert_eq!(output.exit_code, ExitCode::from(1));
}

#[test]
fn test_audit_log() {
    let dir = project();
    run(add("First", &[]), dir.path());
    run(add("Second", &[]), dir.path());
    run(Command::Toggle { id: 1 }, dir.path());

    let output = run(Command::AuditLog { task: None, limit: None }, dir.path());
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    let entries: Vec<serde_json::Value> = serde_json::from_str(&output.stdout[0]).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["operation"], "complete");

    let output = run(Command::AuditLog { task: Some(2), limit: Some(5) }, dir.path());
    let entries: Vec<serde_json::Value> = serde_json::from_str(&output.stdout[0]).unwrap();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = TrackerConfig::config_path(dir.path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "first_id: nope\n").unwrap();

    let output = run(Command::List { json: false }, dir.path());
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr[0].contains("YAML"));
}
