//! CSV import commands.

use std::path::PathBuf;

use clap::Subcommand;
use console::style;

use fp_core::config::ConfigHandle;
use fp_core::error::FpResult;
use fp_services::ImportEntity;

use crate::OutputFormat;

/// Rejected rows printed before the list is cut short.
const MAX_ERRORS_SHOWN: usize = 20;

#[derive(Subcommand)]
pub enum ImportAction {
    /// Import a CSV file (our template or a ServiceM8 export).
    Run {
        /// Target entity: clients, leads, quotes, jobs, payments, staff.
        entity: String,
        /// CSV file to import.
        file: PathBuf,
    },
    /// Print the CSV template for an entity.
    Template {
        /// Target entity: clients, leads, quotes, jobs, payments, staff.
        entity: String,
        /// Write the template to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the importable entities and their required columns.
    Entities,
}

pub async fn run(config: ConfigHandle, action: ImportAction, format: OutputFormat) -> FpResult<()> {
    match action {
        ImportAction::Run { entity, file } => {
            let entity: ImportEntity = entity.parse()?;
            let data = std::fs::read_to_string(&file)?;
            let registry = super::init_registry(config).await?;
            let report = registry.importer.read().await.import(entity, &data)?;

            match format {
                OutputFormat::Json => super::print_json(&report),
                OutputFormat::Text => {
                    println!(
                        "  {} Imported {} {entity} from {} (batch {})",
                        style("OK").green().bold(),
                        report.imported,
                        file.display(),
                        report.batch_id
                    );
                    if !report.errors.is_empty() {
                        println!(
                            "  {} {} row(s) rejected:",
                            style("WARN").yellow().bold(),
                            report.errors.len()
                        );
                        for e in report.errors.iter().take(MAX_ERRORS_SHOWN) {
                            println!("    row {}: {}", e.row, e.reason);
                        }
                        if report.errors.len() > MAX_ERRORS_SHOWN {
                            println!("    ... and {} more", report.errors.len() - MAX_ERRORS_SHOWN);
                        }
                    }
                }
            }
        }
        ImportAction::Template { entity, output } => {
            let template = entity.parse::<ImportEntity>()?.template();
            match (format, output) {
                (_, Some(path)) => {
                    std::fs::write(&path, template.to_csv()?)?;
                    println!(
                        "  {} Template written to {}",
                        style("OK").green().bold(),
                        path.display()
                    );
                }
                (OutputFormat::Json, None) => super::print_json(&template),
                (OutputFormat::Text, None) => print!("{}", template.to_csv()?),
            }
        }
        ImportAction::Entities => {
            let entities: Vec<_> = ImportEntity::ALL
                .iter()
                .map(|e| (e.as_str(), e.required_fields()))
                .collect();
            match format {
                OutputFormat::Json => {
                    let value: serde_json::Map<String, serde_json::Value> = entities
                        .iter()
                        .map(|(name, required)| (name.to_string(), serde_json::json!(required)))
                        .collect();
                    super::print_json(&value);
                }
                OutputFormat::Text => {
                    let mut table = super::new_table(["Entity", "Required columns"]);
                    for (name, required) in &entities {
                        table.add_row(vec![name.to_string(), required.join(", ")]);
                    }
                    println!("{table}");
                }
            }
        }
    }

    Ok(())
}
