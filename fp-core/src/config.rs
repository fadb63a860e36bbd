//! Fencepost settings: `config.toml` plus environment overrides.
//!
//! Every section is optional in the file. Twilio and Basiq credentials can be
//! left out entirely; the matching service then runs degraded.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{FpError, FpResult};
use crate::platform::Platform;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Automation campaign scheduling.
    #[serde(default)]
    pub automation: AutomationConfig,

    /// SMS provider (Twilio) settings.
    #[serde(default)]
    pub sms: SmsConfig,

    /// Open Banking aggregator (Basiq) settings.
    #[serde(default)]
    pub banking: BankingConfig,

    /// Business details used in message templates.
    #[serde(default)]
    pub company: CompanyConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. If empty, uses default location.
    #[serde(default)]
    pub path: String,

    /// Enable WAL (Write-Ahead Logging) mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Run integrity check on startup.
    #[serde(default = "default_true")]
    pub integrity_check_on_startup: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output in the log file.
    #[serde(default)]
    pub json_output: bool,
}

/// Automation scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Run the background campaign scheduler when serving.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between evaluation passes.
    #[serde(default = "default_automation_interval")]
    pub interval_secs: u64,

    /// Fixed UTC offset of the business timezone, in hours.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
}

/// SMS provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    /// Provider API base URL.
    #[serde(default = "default_twilio_base_url")]
    pub base_url: String,

    /// Twilio account SID.
    #[serde(default)]
    pub account_sid: String,

    /// Twilio auth token.
    #[serde(default)]
    pub auth_token: String,

    /// Sender number in E.164 format.
    #[serde(default)]
    pub from_number: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_provider_timeout")]
    pub timeout_ms: u64,
}

/// Open Banking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankingConfig {
    /// Aggregator API base URL.
    #[serde(default = "default_basiq_base_url")]
    pub base_url: String,

    /// Aggregator API key (already base64 encoded, as issued).
    #[serde(default)]
    pub api_key: String,

    /// Aggregator user whose connected accounts are synced.
    #[serde(default)]
    pub user_id: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_provider_timeout")]
    pub timeout_ms: u64,
}

/// Business details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyConfig {
    /// Trading name substituted for `{companyName}`.
    #[serde(default = "default_company_name")]
    pub name: String,

    /// Contact phone substituted for `{companyPhone}`.
    #[serde(default)]
    pub phone: String,

    /// Discount applied to new trade clients when none is given.
    #[serde(default = "default_trade_discount")]
    pub default_trade_discount_percent: f64,
}

// Default value functions for serde

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_pool_size() -> u32 {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_automation_interval() -> u64 {
    constants::DEFAULT_AUTOMATION_INTERVAL_SECS
}

fn default_utc_offset() -> i32 {
    constants::PERTH_UTC_OFFSET_HOURS
}

fn default_twilio_base_url() -> String {
    "https://api.twilio.com".to_string()
}

fn default_basiq_base_url() -> String {
    "https://au-api.basiq.io".to_string()
}

fn default_provider_timeout() -> u64 {
    constants::DEFAULT_PROVIDER_TIMEOUT_MS
}

fn default_company_name() -> String {
    "Fencepost Fencing".to_string()
}

fn default_trade_discount() -> f64 {
    10.0
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            wal_mode: true,
            pool_size: default_pool_size(),
            integrity_check_on_startup: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_automation_interval(),
            utc_offset_hours: default_utc_offset(),
        }
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            base_url: default_twilio_base_url(),
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            timeout_ms: default_provider_timeout(),
        }
    }
}

impl Default for BankingConfig {
    fn default() -> Self {
        Self {
            base_url: default_basiq_base_url(),
            api_key: String::new(),
            user_id: String::new(),
            timeout_ms: default_provider_timeout(),
        }
    }
}

impl Default for CompanyConfig {
    fn default() -> Self {
        Self {
            name: default_company_name(),
            phone: String::new(),
            default_trade_discount_percent: default_trade_discount(),
        }
    }
}

impl SmsConfig {
    /// Whether enough is configured to send messages.
    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.from_number.is_empty()
    }
}

impl BankingConfig {
    /// Whether enough is configured to sync accounts.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.user_id.is_empty()
    }
}

/// Environment variables that override the file. Credentials usually live
/// here rather than in `config.toml`.
pub const ENV_OVERRIDES: &[&str] = &[
    "FENCEPOST_PORT",
    "FENCEPOST_DB_PATH",
    "FENCEPOST_LOG_LEVEL",
    "TWILIO_ACCOUNT_SID",
    "TWILIO_AUTH_TOKEN",
    "TWILIO_FROM_NUMBER",
    "BASIQ_API_KEY",
    "BASIQ_USER_ID",
];

impl AppConfig {
    /// `config.toml` from the config directory if present, otherwise
    /// defaults; environment overrides applied on top.
    pub fn load_default() -> FpResult<Self> {
        let path = Self::default_config_path()?;
        let config = if path.exists() {
            Self::parse_file(&path)?
        } else {
            Self::default()
        };
        config.finish(|key| std::env::var(key).ok())
    }

    pub fn load_from_file(path: &Path) -> FpResult<Self> {
        Self::parse_file(path)?.finish(|key| std::env::var(key).ok())
    }

    fn parse_file(path: &Path) -> FpResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FpError::Config(format!("cannot read {}: {e}", path.display())))?;
        Ok(toml::from_str(&contents)?)
    }

    fn finish(mut self, lookup: impl Fn(&str) -> Option<String>) -> FpResult<Self> {
        self.apply_env(lookup)?;
        self.validate()?;
        Ok(self)
    }

    /// Overlay any of [`ENV_OVERRIDES`] that `lookup` returns. Blank values
    /// are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> FpResult<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("FENCEPOST_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| FpError::Config(format!("FENCEPOST_PORT is not a port: {port}")))?;
        }
        if let Some(path) = get("FENCEPOST_DB_PATH") {
            self.database.path = path;
        }
        if let Some(level) = get("FENCEPOST_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(sid) = get("TWILIO_ACCOUNT_SID") {
            self.sms.account_sid = sid;
        }
        if let Some(token) = get("TWILIO_AUTH_TOKEN") {
            self.sms.auth_token = token;
        }
        if let Some(from) = get("TWILIO_FROM_NUMBER") {
            self.sms.from_number = from;
        }
        if let Some(key) = get("BASIQ_API_KEY") {
            self.banking.api_key = key;
        }
        if let Some(user) = get("BASIQ_USER_ID") {
            self.banking.user_id = user;
        }
        Ok(())
    }

    /// Reject values that would make the scheduler or timezone math meaningless.
    pub fn validate(&self) -> FpResult<()> {
        if self.automation.interval_secs == 0 {
            return Err(FpError::Config("automation.interval_secs must be greater than 0".into()));
        }
        if !(-12..=14).contains(&self.automation.utc_offset_hours) {
            return Err(FpError::Config(format!(
                "automation.utc_offset_hours out of range: {}",
                self.automation.utc_offset_hours
            )));
        }
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> FpResult<PathBuf> {
        let config_dir = Platform::config_dir()?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get the effective database path, using the configured path or the default.
    pub fn effective_db_path(&self) -> FpResult<PathBuf> {
        if self.database.path.is_empty() {
            let data_dir = Platform::data_dir()?;
            Ok(data_dir.join("fencepost.db"))
        } else {
            Ok(PathBuf::from(&self.database.path))
        }
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> FpResult<PathBuf> {
        if self.logging.directory.is_empty() {
            let data_dir = Platform::data_dir()?;
            Ok(data_dir.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// The `host:port` string the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Thread-safe configuration holder for shared access across services.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }

    /// Clone the current configuration out of the lock.
    pub async fn snapshot(&self) -> AppConfig {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.database.wal_mode);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.automation.interval_secs, 300);
        assert_eq!(config.automation.utc_offset_hours, 8);
        assert!(!config.sms.is_configured());
        assert!(!config.banking.is_configured());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [sms]
            account_sid = "AC123"
            auth_token = "secret"
            from_number = "+61400000000"
            "#,
        )
        .unwrap();
        assert!(config.sms.is_configured());
        assert_eq!(config.sms.base_url, "https://api.twilio.com");
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = AppConfig::default();
        config.automation.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = AppConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.server.port, config.server.port);
        assert_eq!(deserialized.company.name, config.company.name);
    }

    #[test]
    fn test_env_overrides_credentials() {
        let env: std::collections::HashMap<&str, &str> = [
            ("TWILIO_ACCOUNT_SID", "AC999"),
            ("TWILIO_AUTH_TOKEN", "tok"),
            ("TWILIO_FROM_NUMBER", "+61400000001"),
            ("BASIQ_USER_ID", "  "),
            ("FENCEPOST_PORT", "9090"),
        ]
        .into_iter()
        .collect();
        let config = AppConfig::default()
            .finish(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert!(config.sms.is_configured());
        assert_eq!(config.sms.account_sid, "AC999");
        assert!(config.banking.user_id.is_empty());
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn test_every_override_is_applied() {
        let mut config = AppConfig::default();
        config
            .apply_env(|k| ENV_OVERRIDES.contains(&k).then(|| "7".to_string()))
            .unwrap();
        assert_eq!(config.server.port, 7);
        assert_eq!(config.database.path, "7");
        assert_eq!(config.logging.level, "7");
        assert!(config.sms.is_configured());
        assert!(config.banking.is_configured());
    }

    #[test]
    fn test_bad_port_override_is_config_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|k| (k == "FENCEPOST_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, FpError::Config(_)));
    }

    #[test]
    fn test_bind_address() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }
}
