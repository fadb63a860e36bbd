//! Structured logging setup using the `tracing` ecosystem.
//!
//! Console output goes to stderr in compact form; the log file rotates daily
//! and can be written as JSON for ingestion. `RUST_LOG`, when set, replaces
//! the configured level.

use std::path::Path;

use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::FpResult;

/// Dependencies that are chatty at debug level.
const QUIET_DEPENDENCIES: &[&str] = &["hyper=info", "h2=info", "rustls=info", "r2d2=info"];

/// Guard that keeps the non-blocking log writer alive.
/// Drop this to flush and close the log file.
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize the global tracing subscriber.
///
/// `level` is a level or filter directive, e.g. "info" or
/// "fp_services=debug,info".
pub fn init_logging(level: &str, log_dir: &Path, json_output: bool) -> FpResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, "fencepost.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    let (json_layer, text_layer) = if json_output {
        let layer = fmt::layer()
            .with_writer(writer)
            .json()
            .with_current_span(true)
            .with_file(true)
            .with_line_number(true);
        (Some(layer), None)
    } else {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true);
        (None, Some(layer))
    };

    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(console_layer)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| crate::error::FpError::Internal(format!("logging already initialized: {e}")))?;

    tracing::info!("logging initialized at level={level}, dir={}", log_dir.display());
    Ok(LogGuard { _guard: guard })
}

/// Console-only logger for tests and one-shot commands. Repeat calls are
/// ignored.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(build_filter(level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact(),
        )
        .try_init();
}

/// `RUST_LOG` if set, otherwise `level` plus the quiet dependency
/// directives. An unparsable level falls back to `info`.
fn build_filter(level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    filter_directives(level)
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn filter_directives(level: &str) -> Option<String> {
    let level = level.trim();
    if level.is_empty() {
        return None;
    }
    let mut directives = vec![level.to_string()];
    for quiet in QUIET_DEPENDENCIES {
        let target = quiet.split('=').next().unwrap_or_default();
        if !level.contains(target) {
            directives.push(quiet.to_string());
        }
    }
    Some(directives.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_quiet_dependencies() {
        let d = filter_directives("debug").unwrap();
        assert!(d.starts_with("debug,"));
        assert!(d.contains("hyper=info"));
    }

    #[test]
    fn test_explicit_target_is_kept() {
        let d = filter_directives("hyper=trace,info").unwrap();
        assert!(d.contains("hyper=trace"));
        assert!(!d.contains("hyper=info"));
    }

    #[test]
    fn test_blank_level_has_no_directives() {
        assert!(filter_directives("  ").is_none());
    }

    #[test]
    fn test_console_logging_does_not_panic() {
        init_console_logging("debug");
        init_console_logging("not a valid filter [");
    }
}
