//! Bank reconciliation commands.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::Subcommand;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use fp_core::config::ConfigHandle;
use fp_core::error::FpResult;
use fp_models::models::bank::TransactionFilter;
use fp_services::CsvColumnMapping;

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum BankAction {
    /// Pull accounts and transactions from the Open Banking feed.
    Sync {
        /// Only fetch transactions posted on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<NaiveDate>,
    },
    /// Load a bank statement CSV.
    Upload {
        /// Statement file.
        file: PathBuf,
        /// Date column.
        #[arg(long, default_value = "Date")]
        date: String,
        /// Description column.
        #[arg(long, default_value = "Description")]
        description: String,
        /// Signed amount column. Ignored when --debit or --credit is given.
        #[arg(long, default_value = "Amount")]
        amount: String,
        /// Money-out column.
        #[arg(long)]
        debit: Option<String>,
        /// Money-in column.
        #[arg(long)]
        credit: Option<String>,
        /// Column holding DR/CR or debit/credit.
        #[arg(long)]
        direction: Option<String>,
        /// Column holding the card number.
        #[arg(long)]
        card: Option<String>,
    },
    /// Match unallocated debits to staff by card number.
    Allocate,
    /// Assign one transaction to a staff member, or clear it.
    Assign {
        /// Transaction ID.
        id: i64,
        /// Staff member ID. Omit to clear the allocation.
        #[arg(short, long)]
        staff: Option<i64>,
    },
    /// List transactions.
    Transactions {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        /// unallocated, auto or manual.
        #[arg(short, long)]
        status: Option<String>,
        #[arg(short = 'n', long, default_value = "50")]
        limit: i64,
    },
    /// Spending per staff member.
    Summary {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

pub async fn run(config: ConfigHandle, action: BankAction, format: OutputFormat) -> FpResult<()> {
    let registry = super::init_registry(config).await?;
    let reconciliation = registry.reconciliation.read().await;

    match action {
        BankAction::Sync { since } => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("  {spinner} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb.set_message("Syncing bank feed...");

            let result = reconciliation.sync_open_banking(since).await;
            pb.finish_and_clear();
            let report = result?;

            match format {
                OutputFormat::Json => super::print_json(&report),
                OutputFormat::Text => {
                    let window = report
                        .since
                        .map(|d| format!(" since {d}"))
                        .unwrap_or_default();
                    println!(
                        "  {} {} account(s){window}: {} new, {} updated transaction(s).",
                        style("OK").green().bold(),
                        report.accounts,
                        report.inserted,
                        report.updated
                    );
                }
            }
        }
        BankAction::Upload { file, date, description, amount, debit, credit, direction, card } => {
            let split = debit.is_some() || credit.is_some();
            let mapping = CsvColumnMapping {
                date,
                description,
                amount: if split { None } else { Some(amount) },
                debit,
                credit,
                direction,
                card,
            };
            let data = std::fs::read_to_string(&file)?;
            let report = reconciliation.import_csv(&data, &mapping)?;

            match format {
                OutputFormat::Json => super::print_json(&report),
                OutputFormat::Text => {
                    println!(
                        "  {} Loaded {} transaction(s) from {} (batch {})",
                        style("OK").green().bold(),
                        report.imported,
                        file.display(),
                        report.batch_id
                    );
                    for e in &report.errors {
                        println!("    {} row {}: {}", style("skip").yellow(), e.row, e.reason);
                    }
                }
            }
        }
        BankAction::Allocate => {
            let report = reconciliation.auto_allocate()?;
            match format {
                OutputFormat::Json => super::print_json(&report),
                OutputFormat::Text => {
                    println!(
                        "  {} {} of {} debit(s) allocated ({} ambiguous, {} unmatched).",
                        style("OK").green().bold(),
                        report.allocated,
                        report.considered,
                        report.ambiguous,
                        report.unmatched
                    );
                }
            }
        }
        BankAction::Assign { id, staff } => {
            let tx = match staff {
                Some(staff_id) => reconciliation.allocate(id, staff_id)?,
                None => reconciliation.unallocate(id)?,
            };
            match format {
                OutputFormat::Json => super::print_json(&tx),
                OutputFormat::Text => {
                    println!(
                        "  {} Transaction {id} is now {}.",
                        style("OK").green().bold(),
                        tx.allocation_status
                    );
                }
            }
        }
        BankAction::Transactions { from, to, status, limit } => {
            let filter = TransactionFilter {
                from,
                to,
                allocation_status: status,
                staff_member_id: None,
                limit: Some(limit),
            };
            let transactions = reconciliation.transactions(&filter)?;
            match format {
                OutputFormat::Json => super::print_json(&transactions),
                OutputFormat::Text => {
                    if transactions.is_empty() {
                        println!("No transactions.");
                        return Ok(());
                    }
                    let mut table =
                        super::new_table(["ID", "Date", "Description", "Amount", "Status", "Staff"]);
                    for tx in &transactions {
                        table.add_row(vec![
                            tx.id.map(|id| id.to_string()).unwrap_or_default(),
                            tx.posted_on.to_string(),
                            super::truncate(&tx.description, 40),
                            tx.amount.to_string(),
                            tx.allocation_status.clone(),
                            tx.staff_member_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
                        ]);
                    }
                    println!("{table}");
                }
            }
        }
        BankAction::Summary { from, to } => {
            let summary = reconciliation.staff_summary(from, to)?;
            match format {
                OutputFormat::Json => super::print_json(&summary),
                OutputFormat::Text => {
                    let mut table = super::new_table(["Staff", "Transactions", "Total"]);
                    for s in &summary {
                        table.add_row(vec![
                            s.name.clone(),
                            s.transaction_count.to_string(),
                            format!("${:.2}", s.total),
                        ]);
                    }
                    println!("{table}");
                }
            }
        }
    }

    Ok(())
}
