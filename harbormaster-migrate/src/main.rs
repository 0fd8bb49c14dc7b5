//! Harbormaster Migration CLI Tool
//!
//! Applies and rolls back this project's migrations. Exits 0 on success and 1
//! on any failure.

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use harbormaster::connection::redact_connection_string;
use harbormaster::migration::Migrator;
use harbormaster::{connect, DatabaseConfig, MayPostgresExecutor};
use harbormaster_migrate::cli::{Action, Cli};
use harbormaster_migrate::{commands, migrations, scaffold};
use std::io::{self, Write};
use std::process;

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    match run(&cli) {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let action = cli.action()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Action::Generate { name, version, dir } = &action {
        let path = scaffold::generate(dir, name, version)?;
        writeln!(out, "{} {}", "Generated".green(), path.display())?;
        writeln!(out, "Register it in the migrations registry to include it in runs")?;
        return Ok(());
    }

    let config = DatabaseConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    let connection_string = cli
        .database_url_override(|var| std::env::var(var).ok())
        .unwrap_or_else(|| config.connection_string());

    log::debug!("Connecting to {}", redact_connection_string(&connection_string));
    let client = connect(&connection_string).context("failed to connect to database")?;
    let executor = MayPostgresExecutor::new(client);

    let registry = migrations::registry().context("failed to register migrations")?;
    let mut migrator = Migrator::new(&executor, &registry).with_lock_timeout(config.lock_timeout());

    match action {
        Action::Apply { dry_run } => commands::run_apply(&mut migrator, &mut out, dry_run),
        Action::Rollback { version } => commands::run_rollback(&mut migrator, &mut out, &version),
        Action::Status => commands::run_status(&mut migrator, &mut out),
        Action::History => commands::run_history(&migrator, &mut out),
        Action::Validate => commands::run_validate(&mut migrator, &mut out),
        Action::Generate { .. } => Ok(()),
    }
}
