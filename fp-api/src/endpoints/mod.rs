//! Provider endpoint implementations.

pub mod basiq;
pub mod twilio;
