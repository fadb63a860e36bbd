//! Entity model definitions.

pub mod client;
pub mod lead;
pub mod quote;
pub mod job;
pub mod payment;
pub mod campaign;
pub mod sms_log;
pub mod staff;
pub mod bank;
