//! Fencepost Models - Database schema, models, migrations, and queries.
//!
//! This crate owns all data persistence: SQLite database initialization,
//! entity models for the fencing business (clients through bank
//! transactions), versioned migrations, and the join queries the batch
//! processors and dashboards rely on.

pub mod db;
pub mod schema;
pub mod models;
pub mod queries;
pub mod migrations;
pub mod sql;

// Re-export key types
pub use db::{Database, DbPool};
pub use models::client::Client;
pub use models::lead::Lead;
pub use models::quote::Quote;
pub use models::job::{Job, JobBom, BomItem, JobSection};
pub use models::payment::Payment;
pub use models::campaign::{Campaign, TriggerType};
pub use models::sms_log::SmsLog;
pub use models::staff::StaffMember;
pub use models::bank::{BankAccount, BankTransaction, Direction};
