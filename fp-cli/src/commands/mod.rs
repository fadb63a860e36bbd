//! CLI command implementations.

pub mod automation;
pub mod bank;
pub mod campaigns;
pub mod db;
pub mod import;
pub mod serve;

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use fp_core::config::ConfigHandle;
use fp_core::error::FpResult;
use fp_models::Database;
use fp_services::{Providers, ServiceRegistry};

/// Helper to initialize the database from config.
pub async fn init_database(config: &ConfigHandle) -> FpResult<Database> {
    let config = config.read().await;
    Database::init(&config.effective_db_path()?, &config.database)
}

/// Open the database, build the providers from config and initialize every
/// service.
pub async fn init_registry(config: ConfigHandle) -> FpResult<ServiceRegistry> {
    let database = init_database(&config).await?;
    let providers = Providers::from_config(&*config.read().await)?;
    let registry = ServiceRegistry::new(config, database, providers).await;
    registry.init_all().await?;
    Ok(registry)
}

/// An empty table with the shared look.
pub fn new_table<I, S>(header: I) -> Table
where
    I: IntoIterator<Item = S>,
    S: Into<comfy_table::Cell>,
{
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Truncate a string to at most `max_len` characters, appending an ellipsis
/// if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
