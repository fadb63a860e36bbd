//! `fencepost db`: inspect, verify and reset the business database.

use std::path::Path;

use clap::Subcommand;
use console::style;
use dialoguer::Confirm;

use fp_core::config::ConfigHandle;
use fp_core::error::FpResult;
use fp_models::Database;

use crate::OutputFormat;

/// Violations listed before the rest are summarised.
const MAX_VIOLATIONS_SHOWN: usize = 10;

#[derive(Subcommand)]
pub enum DbAction {
    /// Row counts, schema version and file sizes.
    Stats,
    /// Integrity and foreign key checks.
    Check,
    /// Delete all business data and reseed the default campaigns.
    Reset {
        /// Do not ask for confirmation.
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the database file path.
    Path,
}

pub async fn run(config: ConfigHandle, action: DbAction, format: OutputFormat) -> FpResult<()> {
    let db_path = config.read().await.effective_db_path()?;

    match action {
        DbAction::Stats => stats(&super::init_database(&config).await?, &db_path, format),
        DbAction::Check => check(&super::init_database(&config).await?),
        DbAction::Reset { yes } => {
            println!("  {} every client, quote, job and transaction in", style("WARNING").red().bold());
            println!("  {} will be deleted.", db_path.display());
            let confirmed = yes
                || Confirm::new()
                    .with_prompt("  Reset the database?")
                    .default(false)
                    .interact()
                    .unwrap_or(false);
            if !confirmed {
                println!("  Reset cancelled.");
                return Ok(());
            }
            super::init_database(&config).await?.reset()?;
            println!("  {} Database reset; default campaigns reseeded (inactive).", style("OK").green().bold());
            Ok(())
        }
        DbAction::Path => {
            match format {
                OutputFormat::Json => {
                    super::print_json(&serde_json::json!({ "path": db_path.display().to_string() }))
                }
                OutputFormat::Text => println!("{}", db_path.display()),
            }
            Ok(())
        }
    }
}

fn file_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

fn stats(db: &Database, db_path: &Path, format: OutputFormat) -> FpResult<()> {
    let stats = db.stats()?;
    let journal_mode = db.journal_mode()?;
    let schema_version = db.schema_version()?;
    let db_size = file_len(db_path);
    let wal_size = file_len(&db_path.with_extension("db-wal"));

    if let OutputFormat::Json = format {
        super::print_json(&serde_json::json!({
            "path": db_path.display().to_string(),
            "schemaVersion": schema_version,
            "journalMode": journal_mode,
            "rows": stats,
            "sizeBytes": db_size,
            "walSizeBytes": wal_size,
        }));
        return Ok(());
    }

    println!("{}", style(db_path.display()).bold());
    println!("  schema v{schema_version}, journal {journal_mode}");
    if let Some(size) = db_size {
        let wal = wal_size.map(super::format_bytes).unwrap_or_else(|| "none".into());
        println!("  {} on disk, WAL {wal}", super::format_bytes(size));
    }
    println!();

    let mut table = super::new_table(["Table", "Rows"]);
    for (name, count) in stats.rows() {
        table.add_row(vec![name.to_string(), count.to_string()]);
    }
    println!("{table}");
    Ok(())
}

fn check(db: &Database) -> FpResult<()> {
    match db.run_integrity_check() {
        Ok(()) => println!("  {} integrity_check", style("OK").green().bold()),
        Err(e) => println!("  {} integrity_check: {e}", style("FAIL").red().bold()),
    }

    let violations = db.foreign_key_violations()?;
    if violations.is_empty() {
        println!("  {} foreign_key_check", style("OK").green().bold());
        return Ok(());
    }

    println!(
        "  {} foreign_key_check: {} orphaned row(s)",
        style("WARN").yellow().bold(),
        violations.len()
    );
    for v in violations.iter().take(MAX_VIOLATIONS_SHOWN) {
        println!("    - {v}");
    }
    if violations.len() > MAX_VIOLATIONS_SHOWN {
        println!("    ... and {} more", violations.len() - MAX_VIOLATIONS_SHOWN);
    }
    Ok(())
}
