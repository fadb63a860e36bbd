//! Automation commands - run a campaign pass, view the SMS log, send a one-off.

use chrono::Utc;
use clap::Subcommand;
use console::style;

use fp_core::config::ConfigHandle;
use fp_core::error::FpResult;
use fp_services::ManualSms;

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum AutomationAction {
    /// Evaluate every active campaign once and send what is due.
    Run,
    /// Show recent SMS log entries.
    Logs {
        /// Number of entries to show.
        #[arg(short = 'n', long, default_value = "50")]
        count: i64,
    },
    /// Send a one-off message.
    Send {
        /// Recipient phone number.
        #[arg(short, long)]
        to: String,
        /// Message text.
        #[arg(short, long)]
        message: String,
    },
}

pub async fn run(config: ConfigHandle, action: AutomationAction, format: OutputFormat) -> FpResult<()> {
    let registry = super::init_registry(config).await?;
    let automation = registry.automation.read().await;

    match action {
        AutomationAction::Run => {
            let report = automation.run_pass(Utc::now()).await?;
            match format {
                OutputFormat::Json => super::print_json(&report),
                OutputFormat::Text => {
                    if report.campaigns.is_empty() {
                        println!("No active campaigns.");
                        return Ok(());
                    }
                    let mut table = super::new_table([
                        "Campaign", "Trigger", "Considered", "Sent", "Failed", "Skipped", "Note",
                    ]);
                    for c in &report.campaigns {
                        let skipped = c.skipped_not_due
                            + c.skipped_already_sent
                            + c.skipped_no_phone
                            + c.skipped_client_type
                            + c.skipped_bad_delay;
                        let note = if let Some(e) = &c.error {
                            e.clone()
                        } else if c.skipped_window {
                            "outside send window".to_string()
                        } else {
                            String::new()
                        };
                        table.add_row(vec![
                            c.campaign_name.clone(),
                            c.trigger_type.clone(),
                            c.considered.to_string(),
                            c.sent.to_string(),
                            c.failed.to_string(),
                            skipped.to_string(),
                            note,
                        ]);
                    }
                    println!("{table}");

                    let failed = report.failed();
                    let status = if failed == 0 {
                        style("OK").green().bold()
                    } else {
                        style("WARN").yellow().bold()
                    };
                    println!("\n  {status} {} sent, {failed} failed.", report.sent());
                }
            }
        }
        AutomationAction::Logs { count } => {
            let logs = automation.recent_logs(count.clamp(1, 1000), None)?;
            match format {
                OutputFormat::Json => super::print_json(&logs),
                OutputFormat::Text => {
                    if logs.is_empty() {
                        println!("No SMS activity.");
                        return Ok(());
                    }
                    let mut table = super::new_table(["When", "Dir", "Number", "Status", "Message"]);
                    for log in &logs {
                        let number = if log.direction == "inbound" {
                            log.from_number.clone().unwrap_or_default()
                        } else {
                            log.to_number.clone()
                        };
                        table.add_row(vec![
                            log.created_at.format("%Y-%m-%d %H:%M").to_string(),
                            log.direction.clone(),
                            number,
                            log.status.clone(),
                            super::truncate(&log.body, 50),
                        ]);
                    }
                    println!("{table}");
                }
            }
        }
        AutomationAction::Send { to, message } => {
            let request = ManualSms {
                to,
                body: message,
                entity_type: None,
                entity_id: None,
            };
            let log = automation.send_manual(&request).await?;
            match format {
                OutputFormat::Json => super::print_json(&log),
                OutputFormat::Text => {
                    println!(
                        "  {} Sent to {} ({})",
                        style("OK").green().bold(),
                        log.to_number,
                        log.provider_message_id.as_deref().unwrap_or("no id")
                    );
                }
            }
        }
    }

    Ok(())
}
