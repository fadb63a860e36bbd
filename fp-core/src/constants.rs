//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "Fencepost";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Database schema version.
pub const DB_SCHEMA_VERSION: i32 = 1;

/// Default interval between automation passes, in seconds.
pub const DEFAULT_AUTOMATION_INTERVAL_SECS: u64 = 300;

/// Perth (AWST) is UTC+8 all year round.
pub const PERTH_UTC_OFFSET_HOURS: i32 = 8;

/// Default outbound provider timeout in milliseconds.
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 30_000;

/// Prefix and zero-padding for generated quote numbers.
pub const QUOTE_NUMBER_PREFIX: &str = "Q-";

/// Prefix for generated job numbers.
pub const JOB_NUMBER_PREFIX: &str = "J-";

/// Width of the numeric part of generated document numbers.
pub const DOCUMENT_NUMBER_WIDTH: usize = 5;

/// Entity type tags stored on SMS log rows.
pub mod entity {
    pub const PAYMENT: &str = "payment";
    pub const QUOTE: &str = "quote";
    pub const LEAD: &str = "lead";
    pub const JOB: &str = "job";
    pub const CLIENT: &str = "client";
}

/// Client types.
pub mod client_type {
    pub const PUBLIC: &str = "public";
    pub const TRADE: &str = "trade";

    /// All valid client types.
    pub const ALL: &[&str] = &[PUBLIC, TRADE];
}

/// Format a generated document number, e.g. `Q-00012`.
pub fn document_number(prefix: &str, sequence: i64) -> String {
    format!("{prefix}{sequence:0width$}", width = DOCUMENT_NUMBER_WIDTH)
}
