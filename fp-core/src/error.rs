//! The one error type shared by every Fencepost crate.
//!
//! Variants are grouped by who is at fault: the local store, the caller's
//! input, an upstream provider, or Fencepost itself. The REST layer maps
//! those groups onto 4xx/5xx statuses.

use thiserror::Error;

pub type FpResult<T> = Result<T, FpError>;

#[derive(Error, Debug)]
pub enum FpError {
    #[error("configuration error: {0}")]
    Config(String),

    /// A provider section (SMS, Open Banking) is needed but not filled in.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("database integrity check failed: {0}")]
    IntegrityCheck(String),

    /// Unique key collision, or a state change the row no longer allows
    /// (accepting a quote twice).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed CSV as a whole. Bad rows are reported per row instead.
    #[error("import error: {0}")]
    Import(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("request timeout: {0}")]
    Timeout(String),

    /// Non-success response from Twilio or Basiq.
    #[error("{provider} error (status {status}): {message}")]
    Provider {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// A message could not be handed to the SMS provider.
    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("service init error: {0}")]
    ServiceInit(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FpError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        FpError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// The failure happened on the far side of an HTTP call.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            FpError::Http(_)
                | FpError::Timeout(_)
                | FpError::Provider { .. }
                | FpError::AuthFailed(_)
                | FpError::SendFailed(_)
        )
    }

    /// The caller can fix this by changing the request.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            FpError::Validation(_) | FpError::Import(_) | FpError::NotFound { .. } | FpError::Conflict(_)
        )
    }
}

impl From<serde_json::Error> for FpError {
    fn from(e: serde_json::Error) -> Self {
        FpError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for FpError {
    fn from(e: toml::de::Error) -> Self {
        FpError::Config(e.to_string())
    }
}

impl From<csv::Error> for FpError {
    fn from(e: csv::Error) -> Self {
        FpError::Import(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_the_entity() {
        assert_eq!(FpError::not_found("quote", 42).to_string(), "quote not found: 42");
    }

    #[test]
    fn test_provider_failures_are_upstream() {
        let err = FpError::Provider {
            provider: "twilio",
            status: 400,
            message: "invalid number".into(),
        };
        assert!(err.is_upstream());
        assert!(!err.is_caller_error());
        assert_eq!(err.to_string(), "twilio error (status 400): invalid number");
        assert!(FpError::SendFailed("timeout".into()).is_upstream());
    }

    #[test]
    fn test_caller_errors() {
        assert!(FpError::Validation("bad window".into()).is_caller_error());
        assert!(FpError::Conflict("already accepted".into()).is_caller_error());
        assert!(!FpError::Database("locked".into()).is_caller_error());
        assert!(!FpError::MissingConfig("sms".into()).is_caller_error());
    }

    #[test]
    fn test_csv_error_becomes_import() {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader("a,b\nc\n".as_bytes());
        let err = reader.records().find_map(|r| r.err()).map(FpError::from).unwrap();
        assert!(matches!(err, FpError::Import(_)));
    }
}
