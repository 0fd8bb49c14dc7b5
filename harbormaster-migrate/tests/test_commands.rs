//! Tests for the command handlers' reports

use harbormaster::migration::Migrator;
use harbormaster::test_helpers::MemoryExecutor;
use harbormaster_migrate::{commands, migrations};

fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap()
}

#[test]
fn test_apply_reports_each_migration() {
    let registry = migrations::registry().unwrap();
    let executor = MemoryExecutor::new();
    let mut migrator = Migrator::new(&executor, &registry);
    let mut out = Vec::new();

    commands::run_apply(&mut migrator, &mut out, false).unwrap();
    let text = output(out);

    assert!(text.starts_with("Current version: none"));
    let users = text.find("Applying create_users_table (version 1.0.0)...").unwrap();
    let posts = text.find("Applying create_posts_table (version 1.1.0)...").unwrap();
    assert!(users < posts);
    assert!(text.contains("Applied 2 migration(s)"));
    assert!(text.contains("Current version: 1.1.0"));
    assert!(text.contains("VERSION"));
}

#[test]
fn test_apply_when_up_to_date() {
    let registry = migrations::registry().unwrap();
    let executor = MemoryExecutor::new();
    let mut migrator = Migrator::new(&executor, &registry);
    migrator.apply_migrations().unwrap();

    let mut out = Vec::new();
    commands::run_apply(&mut migrator, &mut out, false).unwrap();
    let text = output(out);
    assert!(text.contains("No migrations to apply"));
    assert!(!text.contains("Applying"));
}

#[test]
fn test_dry_run_changes_nothing() {
    let registry = migrations::registry().unwrap();
    let executor = MemoryExecutor::new();
    let mut migrator = Migrator::new(&executor, &registry);

    let mut out = Vec::new();
    commands::run_apply(&mut migrator, &mut out, true).unwrap();
    let text = output(out);

    assert!(text.contains("Would apply 2 migration(s):"));
    assert!(text.contains("1. create_users_table (version 1.0.0)"));
    assert!(text.contains("2. create_posts_table (version 1.1.0)"));
    assert!(executor.entries().is_empty());
    assert!(executor.schema_log().is_empty());
}

#[test]
fn test_apply_failure_names_the_migration() {
    let registry = migrations::registry().unwrap();
    let executor = MemoryExecutor::new();
    executor.fail_on("posts");
    let mut migrator = Migrator::new(&executor, &registry);

    let mut out = Vec::new();
    let err = commands::run_apply(&mut migrator, &mut out, false).unwrap_err();
    assert!(format!("{err:#}").contains("create_posts_table"));
    assert_eq!(executor.entries().len(), 1);

    let text = output(out);
    let applying = text.find("Applying create_posts_table (version 1.1.0)...").unwrap();
    let failed = text.find("✗").unwrap();
    assert!(applying < failed);
    assert!(text[failed..].contains("create_posts_table"));
}

#[test]
fn test_rollback_reports_removed_migration() {
    let registry = migrations::registry().unwrap();
    let executor = MemoryExecutor::new();
    let mut migrator = Migrator::new(&executor, &registry);
    migrator.apply_migrations().unwrap();

    let mut out = Vec::new();
    commands::run_rollback(&mut migrator, &mut out, "1.1.0").unwrap();
    let text = output(out);
    assert!(text.contains("Rolling back version 1.1.0..."));
    assert!(text.contains("create_posts_table rolled back"));
    assert!(text.contains("Current version: 1.0.0"));
}

#[test]
fn test_rollback_of_unknown_version_fails() {
    let registry = migrations::registry().unwrap();
    let executor = MemoryExecutor::new();
    let mut migrator = Migrator::new(&executor, &registry);

    let mut out = Vec::new();
    let err = commands::run_rollback(&mut migrator, &mut out, "9.9.9").unwrap_err();
    assert!(format!("{err:#}").contains("rollback of version 9.9.9 failed"));
}

#[test]
fn test_status_lists_pending_and_orphans() {
    let registry = migrations::registry().unwrap();
    let executor = MemoryExecutor::new();
    let mut migrator = Migrator::new(&executor, &registry);
    migrator.apply_migrations().unwrap();
    migrator.rollback_migration("1.1.0").unwrap();
    executor.seed_entry("dropped_feature", "Dropped feature", "0.9.0", "abc");

    let mut out = Vec::new();
    commands::run_status(&mut migrator, &mut out).unwrap();
    let text = output(out);
    assert!(text.contains("create_users_table (version 1.0.0"));
    assert!(text.contains("Pending (1):"));
    assert!(text.contains("create_posts_table (version 1.1.0)"));
    assert!(text.contains("dropped_feature (version 0.9.0) is in the ledger but not registered"));
}

#[test]
fn test_history_with_empty_ledger() {
    let registry = migrations::registry().unwrap();
    let executor = MemoryExecutor::new();
    let migrator = Migrator::new(&executor, &registry);

    let mut out = Vec::new();
    commands::run_history(&migrator, &mut out).unwrap();
    assert_eq!(output(out), "No migrations applied\n");
}

#[test]
fn test_validate_detects_modified_migration() {
    let registry = migrations::registry().unwrap();
    let executor = MemoryExecutor::new();
    executor.seed_entry("create_users_table", "Create users table", "1.0.0", "stale");
    let mut migrator = Migrator::new(&executor, &registry);

    let mut out = Vec::new();
    let err = commands::run_validate(&mut migrator, &mut out).unwrap_err();
    assert!(format!("{err:#}").contains("create_users_table"));
}
