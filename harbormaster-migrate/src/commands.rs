//! Command handlers
//!
//! Each handler writes its human-readable report to `out`; the binary passes
//! stdout.

use anyhow::Context;
use colored::Colorize;
use harbormaster::migration::{ApplyEvent, LedgerEntry, Migrator};
use std::io::Write;

fn version_label(version: Option<String>) -> String {
    version.unwrap_or_else(|| "none".to_string())
}

/// Print the ledger as a table, most recent first
///
/// # Errors
///
/// Fails only if writing to `out` fails.
pub fn write_history(out: &mut dyn Write, history: &[LedgerEntry]) -> anyhow::Result<()> {
    if history.is_empty() {
        writeln!(out, "No migrations applied")?;
        return Ok(());
    }

    writeln!(out, "{:<12} {:<32} {:<25} {:>8}", "VERSION", "ID", "APPLIED AT", "TIME")?;
    for entry in history {
        let time = entry
            .execution_time_ms
            .map_or_else(|| "N/A".to_string(), |ms| format!("{ms}ms"));
        writeln!(
            out,
            "{:<12} {:<32} {:<25} {:>8}",
            entry.version,
            entry.id,
            entry.applied_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            time
        )?;
    }
    Ok(())
}

/// Apply pending migrations, or list them with `dry_run`
///
/// # Errors
///
/// Returns the migrator's error (with the failing migration named) or an I/O error.
pub fn run_apply(migrator: &mut Migrator<'_>, out: &mut dyn Write, dry_run: bool) -> anyhow::Result<()> {
    writeln!(out, "Current version: {}", version_label(migrator.get_current_version()))?;

    if dry_run {
        let pending = migrator.dry_run()?;
        if pending.is_empty() {
            writeln!(out, "No pending migrations to apply")?;
        } else {
            writeln!(out, "Would apply {} migration(s):", pending.len())?;
            for (i, migration) in pending.iter().enumerate() {
                writeln!(out, "  {}. {} (version {})", i + 1, migration.id, migration.version)?;
            }
        }
        return Ok(());
    }

    // The observer cannot return errors; remember the first write failure instead.
    let mut write_error = None;
    let report = migrator.apply_migrations_with(&mut |event| {
        let line = match event {
            ApplyEvent::Applying(m) => {
                format!("Applying {} (version {})...", m.id(), m.version())
            }
            ApplyEvent::Applied {
                migration,
                execution_time_ms,
            } => format!(
                "  {} {} in {execution_time_ms}ms",
                "✓".green(),
                migration.id()
            ),
            ApplyEvent::Failed { migration, .. } => {
                format!("  {} {}", "✗".red(), migration.id())
            }
            ApplyEvent::Skipped(m) => {
                log::debug!("{} already applied", m.id());
                return;
            }
        };
        if let Err(e) = writeln!(out, "{line}") {
            write_error.get_or_insert(e);
        }
    });
    if let Some(e) = write_error {
        return Err(e.into());
    }
    let report = report?;

    if report.applied.is_empty() {
        writeln!(out, "{}", "No migrations to apply".green())?;
    } else {
        writeln!(
            out,
            "{}",
            format!("Applied {} migration(s)", report.applied_count()).green()
        )?;
    }
    writeln!(out, "Current version: {}", version_label(migrator.get_current_version()))?;
    writeln!(out)?;
    write_history(out, &migrator.get_migration_history())
}

/// Roll back the migration with exactly `version`
///
/// # Errors
///
/// Returns the migrator's error or an I/O error.
pub fn run_rollback(migrator: &mut Migrator<'_>, out: &mut dyn Write, version: &str) -> anyhow::Result<()> {
    writeln!(out, "Current version: {}", version_label(migrator.get_current_version()))?;
    writeln!(out, "Rolling back version {version}...")?;

    let removed = migrator
        .rollback_migration(version)
        .with_context(|| format!("rollback of version {version} failed"))?;

    writeln!(out, "  {} {} rolled back", "✓".green(), removed.id)?;
    writeln!(out, "Current version: {}", version_label(migrator.get_current_version()))?;
    Ok(())
}

/// Print applied, pending, orphaned and modified migrations
///
/// # Errors
///
/// Returns the migrator's error or an I/O error.
pub fn run_status(migrator: &mut Migrator<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
    let status = migrator.status()?;

    writeln!(out, "Migration Status")?;
    writeln!(out)?;
    if status.applied.is_empty() {
        writeln!(out, "Applied: none")?;
    } else {
        writeln!(out, "Applied ({}):", status.applied_count)?;
        for entry in &status.applied {
            writeln!(
                out,
                "  {} {} (version {}, {})",
                "✓".green(),
                entry.id,
                entry.version,
                entry.applied_at.format("%Y-%m-%d %H:%M:%S")
            )?;
        }
    }

    writeln!(out)?;
    if status.pending.is_empty() {
        writeln!(out, "Pending: none")?;
    } else {
        writeln!(out, "Pending ({}):", status.pending_count)?;
        for pending in &status.pending {
            writeln!(out, "  {} {} (version {})", "…".yellow(), pending.id, pending.version)?;
        }
    }

    for orphan in &status.orphaned {
        writeln!(
            out,
            "{} {} (version {}) is in the ledger but not registered",
            "warning:".yellow().bold(),
            orphan.id,
            orphan.version
        )?;
    }
    for drift in &status.drifted {
        writeln!(
            out,
            "{} {} (version {}) changed after it was applied",
            "warning:".yellow().bold(),
            drift.id,
            drift.version
        )?;
    }

    writeln!(out)?;
    writeln!(
        out,
        "Summary: {} applied, {} pending",
        status.applied_count, status.pending_count
    )?;
    Ok(())
}

/// Print the ledger
///
/// # Errors
///
/// Fails only if writing to `out` fails.
pub fn run_history(migrator: &Migrator<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
    write_history(out, &migrator.get_migration_history())
}

/// Check applied migrations against their stored checksums
///
/// # Errors
///
/// Returns `ChecksumMismatch` (wrapped) for the first modified migration.
pub fn run_validate(migrator: &mut Migrator<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(out, "Validating checksums...")?;
    migrator.verify_checksums()?;
    writeln!(out, "{}", "All checksums valid".green())?;
    Ok(())
}
