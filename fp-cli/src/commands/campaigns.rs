//! Campaign commands - list, enable and disable.

use clap::Subcommand;
use console::style;

use fp_core::config::ConfigHandle;
use fp_core::error::FpResult;

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum CampaignsAction {
    /// List all campaigns.
    List,
    /// Enable a campaign.
    Enable {
        /// Campaign ID.
        id: i64,
    },
    /// Disable a campaign.
    Disable {
        /// Campaign ID.
        id: i64,
    },
}

pub async fn run(config: ConfigHandle, action: CampaignsAction, format: OutputFormat) -> FpResult<()> {
    let registry = super::init_registry(config).await?;
    let automation = registry.automation.read().await;

    match action {
        CampaignsAction::List => {
            let campaigns = automation.campaigns()?;
            match format {
                OutputFormat::Json => super::print_json(&campaigns),
                OutputFormat::Text => {
                    if campaigns.is_empty() {
                        println!("No campaigns.");
                        return Ok(());
                    }
                    let mut table =
                        super::new_table(["ID", "Name", "Trigger", "Delay", "Window", "Clients", "Active"]);
                    for c in &campaigns {
                        table.add_row(vec![
                            c.id.map(|id| id.to_string()).unwrap_or_default(),
                            c.name.clone(),
                            c.trigger_type.to_string(),
                            format!("{}d {}h", c.delay_days, c.delay_hours),
                            c.send_window.clone().unwrap_or_else(|| "any".into()),
                            c.client_type.clone().unwrap_or_else(|| "all".into()),
                            if c.is_active { "yes" } else { "no" }.to_string(),
                        ]);
                    }
                    println!("{table}");
                }
            }
        }
        CampaignsAction::Enable { id } | CampaignsAction::Disable { id } => {
            let active = matches!(action, CampaignsAction::Enable { .. });
            let campaign = automation.set_campaign_active(id, active)?;
            match format {
                OutputFormat::Json => super::print_json(&campaign),
                OutputFormat::Text => {
                    let verb = if active { "enabled" } else { "disabled" };
                    println!("  {} Campaign '{}' {verb}.", style("OK").green().bold(), campaign.name);
                }
            }
        }
    }

    Ok(())
}
