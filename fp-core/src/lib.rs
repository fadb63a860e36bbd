//! Shared foundation for the Fencepost crates: settings, the error type,
//! tracing setup, data/config directory lookup, and business constants such
//! as the Perth UTC offset.

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod platform;

pub use config::{AppConfig, ConfigHandle};
pub use error::{FpError, FpResult};
pub use platform::Platform;
