//! Tests for command-line parsing

use clap::Parser;
use harbormaster_migrate::cli::{Action, Cli};
use std::path::PathBuf;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("harbormaster-migrate").chain(args.iter().copied())).unwrap()
}

#[test]
fn test_no_arguments_applies() {
    let cli = parse(&[]);
    assert_eq!(cli.action().unwrap(), Action::Apply { dry_run: false });
    assert!(cli.action().unwrap().needs_database());
}

#[test]
fn test_up_dry_run() {
    let cli = parse(&["up", "--dry-run"]);
    assert_eq!(cli.action().unwrap(), Action::Apply { dry_run: true });
}

#[test]
fn test_rollback_flag() {
    let cli = parse(&["--rollback", "1.1.0"]);
    assert_eq!(
        cli.action().unwrap(),
        Action::Rollback {
            version: "1.1.0".to_string()
        }
    );
}

#[test]
fn test_down_subcommand_keeps_version_spelling() {
    let cli = parse(&["down", "1.01"]);
    assert_eq!(
        cli.action().unwrap(),
        Action::Rollback {
            version: "1.01".to_string()
        }
    );
}

#[test]
fn test_rollback_flag_with_subcommand_is_rejected() {
    let cli = parse(&["--rollback", "1.0.0", "status"]);
    assert!(cli.action().is_err());
}

#[test]
fn test_generate_defaults() {
    let cli = parse(&["generate", "add_comments", "--version", "1.2.0"]);
    let action = cli.action().unwrap();
    assert_eq!(
        action,
        Action::Generate {
            name: "add_comments".to_string(),
            version: "1.2.0".to_string(),
            dir: PathBuf::from("src/migrations"),
        }
    );
    assert!(!action.needs_database());
}

#[test]
fn test_generate_requires_version() {
    let result = Cli::try_parse_from(["harbormaster-migrate", "generate", "add_comments"]);
    assert!(result.is_err());
}

#[test]
fn test_simple_subcommands() {
    assert_eq!(parse(&["status"]).action().unwrap(), Action::Status);
    assert_eq!(parse(&["history"]).action().unwrap(), Action::History);
    assert_eq!(parse(&["validate"]).action().unwrap(), Action::Validate);
}

#[test]
fn test_log_filter() {
    assert_eq!(parse(&[]).log_filter(), "info");
    assert_eq!(parse(&["-v"]).log_filter(), "debug");
    assert_eq!(parse(&["status", "--quiet"]).log_filter(), "error");
}

#[test]
fn test_verbose_and_quiet_conflict() {
    let result = Cli::try_parse_from(["harbormaster-migrate", "-v", "-q"]);
    assert!(result.is_err());
}

#[test]
fn test_database_url_flag_wins_over_environment() {
    let cli = parse(&["--database-url", "postgresql://flag/db"]);
    let url = cli.database_url_override(|_| Some("postgresql://env/db".to_string()));
    assert_eq!(url.as_deref(), Some("postgresql://flag/db"));
}

#[test]
fn test_database_url_environment_order() {
    let cli = parse(&[]);
    let url = cli.database_url_override(|var| match var {
        "HARBORMASTER_DATABASE_URL" => Some("postgresql://harbormaster/db".to_string()),
        "DATABASE_URL" => Some("postgresql://generic/db".to_string()),
        _ => None,
    });
    assert_eq!(url.as_deref(), Some("postgresql://harbormaster/db"));

    let fallback = cli.database_url_override(|var| {
        (var == "DATABASE_URL").then(|| "postgresql://generic/db".to_string())
    });
    assert_eq!(fallback.as_deref(), Some("postgresql://generic/db"));
}

#[test]
fn test_empty_database_url_is_ignored() {
    let cli = parse(&[]);
    assert_eq!(cli.database_url_override(|_| Some(String::new())), None);
}
