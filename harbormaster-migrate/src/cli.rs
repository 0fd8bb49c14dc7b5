//! Command-line surface

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Environment variables consulted for the connection string, in order
pub const DATABASE_URL_VARS: [&str; 2] = ["HARBORMASTER_DATABASE_URL", "DATABASE_URL"];

#[derive(Parser, Debug)]
#[command(name = "harbormaster-migrate")]
#[command(about = "Migration management tool for Harbormaster")]
#[command(version)]
pub struct Cli {
    /// Database connection URL (overrides config file and environment)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Configuration file (default: config/config.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Roll back the migration whose version is exactly VERSION
    #[arg(long, value_name = "VERSION")]
    pub rollback: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Apply pending migrations (the default)
    Up {
        /// Show what would be applied without running anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Roll back one migration by its exact version
    Down {
        /// Version string as the migration declares it
        version: String,
    },

    /// Show applied, pending, orphaned and modified migrations
    Status,

    /// Show the ledger, most recent first
    History,

    /// Check that applied migrations have not been modified
    Validate,

    /// Write a new migration skeleton
    Generate {
        /// Migration id, e.g. `create_comments_table`
        name: String,

        /// Version of the new migration, e.g. `1.2.0`
        #[arg(long)]
        version: String,

        /// Directory the file is written to
        #[arg(long, default_value = "src/migrations")]
        dir: PathBuf,
    },
}

/// What a parsed command line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Apply { dry_run: bool },
    Rollback { version: String },
    Status,
    History,
    Validate,
    Generate { name: String, version: String, dir: PathBuf },
}

impl Action {
    /// Whether carrying this out needs a database connection
    #[must_use]
    pub fn needs_database(&self) -> bool {
        !matches!(self, Action::Generate { .. })
    }
}

impl Cli {
    /// Resolve flags and subcommand into one action
    ///
    /// # Errors
    ///
    /// Fails when `--rollback` is combined with a subcommand.
    pub fn action(&self) -> anyhow::Result<Action> {
        if let Some(version) = &self.rollback {
            if self.command.is_some() {
                bail!("--rollback cannot be combined with a subcommand");
            }
            return Ok(Action::Rollback {
                version: version.clone(),
            });
        }

        Ok(match self.command.clone() {
            None => Action::Apply { dry_run: false },
            Some(Command::Up { dry_run }) => Action::Apply { dry_run },
            Some(Command::Down { version }) => Action::Rollback { version },
            Some(Command::Status) => Action::Status,
            Some(Command::History) => Action::History,
            Some(Command::Validate) => Action::Validate,
            Some(Command::Generate { name, version, dir }) => {
                Action::Generate { name, version, dir }
            }
        })
    }

    /// Default `env_logger` filter for the verbosity flags
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Explicit database URL: the flag first, then the environment
    pub fn database_url_override(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.database_url
            .clone()
            .or_else(|| DATABASE_URL_VARS.iter().find_map(|var| env(var)))
            .filter(|url| !url.is_empty())
    }
}
