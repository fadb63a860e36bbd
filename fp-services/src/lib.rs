//! Fencepost Services - Business logic and service layer.
//!
//! This crate provides the service trait, the service registry, and the
//! batch processors of the back office:
//! - SMS template rendering and the business-hours send window
//! - Campaign evaluation and the background scheduler
//! - CSV import with ServiceM8 header mapping
//! - Bank reconciliation (Open Banking sync, statement upload, staff cards)
//! - Event bus (typed intra-service communication)

pub mod service;
pub mod registry;
pub mod event_bus;
pub mod template;
pub mod send_window;
pub mod automation;
pub mod scheduler;
pub mod importer;
pub mod reconciliation;
pub mod allocation;

// Re-export key types
pub use service::{Service, ServiceHealth, ServiceState};
pub use registry::{Providers, ServiceRegistry};
pub use event_bus::{AppEvent, EventBus};
pub use automation::{AutomationService, CampaignReport, ManualSms, PassReport};
pub use scheduler::{AutomationScheduler, SchedulerHandle};
pub use importer::{ImportEntity, ImportReport, ImportService, ImportTemplate, RowError};
pub use reconciliation::{
    normalize_amount, resolve_direction, AllocationReport, CsvColumnMapping, ReconciliationService,
    SyncReport, UploadReport,
};
pub use send_window::is_within_send_window;
pub use template::{render, RenderContext};
