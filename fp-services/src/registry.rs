//! Service registry for dependency injection and lifecycle management.
//!
//! The registry owns the shared infrastructure (config, database, event bus,
//! external providers), builds each service from it, initializes them in
//! order and shuts them down in reverse.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use fp_api::{BankFeed, BasiqClient, SmsSender, TwilioClient};
use fp_core::config::{AppConfig, ConfigHandle};
use fp_core::error::{FpError, FpResult};
use fp_models::Database;

use crate::automation::AutomationService;
use crate::event_bus::EventBus;
use crate::importer::ImportService;
use crate::reconciliation::ReconciliationService;
use crate::scheduler::AutomationScheduler;
use crate::service::{Service, ServiceHealth};

/// External providers the services talk to. Either may be absent.
#[derive(Clone, Default)]
pub struct Providers {
    pub sms: Option<Arc<dyn SmsSender>>,
    pub bank: Option<Arc<dyn BankFeed>>,
}

impl Providers {
    /// Build the real Twilio and Basiq clients for whichever sections of the
    /// config are filled in.
    pub fn from_config(config: &AppConfig) -> FpResult<Self> {
        let sms: Option<Arc<dyn SmsSender>> = if config.sms.is_configured() {
            Some(Arc::new(TwilioClient::new(&config.sms)?))
        } else {
            info!("sms provider not configured");
            None
        };
        let bank: Option<Arc<dyn BankFeed>> = if config.banking.is_configured() {
            Some(Arc::new(BasiqClient::new(&config.banking)?))
        } else {
            info!("open banking provider not configured");
            None
        };
        Ok(Self { sms, bank })
    }
}

/// Central service registry that manages all application services.
pub struct ServiceRegistry {
    /// Application configuration.
    pub config: ConfigHandle,
    /// Database connection pool.
    pub database: Database,
    /// Application-level event bus.
    pub event_bus: EventBus,
    pub automation: Arc<RwLock<AutomationService>>,
    pub importer: Arc<RwLock<ImportService>>,
    pub reconciliation: Arc<RwLock<ReconciliationService>>,
}

impl ServiceRegistry {
    /// Create the registry and all services.
    pub async fn new(config: ConfigHandle, database: Database, providers: Providers) -> Self {
        let snapshot = config.snapshot().await;
        let event_bus = EventBus::new(256);

        let automation = AutomationService::new(
            database.clone(),
            event_bus.clone(),
            providers.sms,
            snapshot.company.clone(),
            &snapshot.automation,
        );
        let importer = ImportService::new(database.clone(), event_bus.clone())
            .with_utc_offset(snapshot.automation.utc_offset_hours);
        let reconciliation =
            ReconciliationService::new(database.clone(), event_bus.clone(), providers.bank);

        Self {
            config,
            database,
            event_bus,
            automation: Arc::new(RwLock::new(automation)),
            importer: Arc::new(RwLock::new(importer)),
            reconciliation: Arc::new(RwLock::new(reconciliation)),
        }
    }

    /// Initialize all services in order.
    pub async fn init_all(&self) -> FpResult<()> {
        info!("initializing services");
        init_one(&self.importer).await?;
        init_one(&self.reconciliation).await?;
        init_one(&self.automation).await?;
        info!("all services initialized");
        Ok(())
    }

    /// Shut down all services in reverse order.
    pub async fn shutdown_all(&self) -> FpResult<()> {
        info!("shutting down services");
        shutdown_one(&self.automation).await;
        shutdown_one(&self.reconciliation).await;
        shutdown_one(&self.importer).await;
        info!("all services shut down");
        Ok(())
    }

    /// Build the automation scheduler from the current config, or `None`
    /// when automation is switched off.
    pub async fn scheduler(&self) -> Option<AutomationScheduler> {
        let config = self.config.read().await;
        if !config.automation.enabled {
            warn!("automation disabled in config, scheduler not started");
            return None;
        }
        let interval = Duration::from_secs(config.automation.interval_secs.max(1));
        Some(AutomationScheduler::new(self.automation.clone(), interval))
    }

    /// Get a reference to the event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Get the health status of all services.
    pub async fn health_check(&self) -> Vec<ServiceHealth> {
        vec![
            health_of(&self.importer).await,
            health_of(&self.reconciliation).await,
            health_of(&self.automation).await,
        ]
    }
}

async fn init_one<S: Service>(service: &RwLock<S>) -> FpResult<()> {
    let mut svc = service.write().await;
    let name = svc.name().to_string();
    info!("initializing service: {name}");
    if let Err(e) = svc.init() {
        error!("failed to initialize service {name}: {e}");
        return Err(FpError::ServiceInit(format!("{name}: {e}")));
    }
    Ok(())
}

async fn shutdown_one<S: Service>(service: &RwLock<S>) {
    let mut svc = service.write().await;
    info!("shutting down service: {}", svc.name());
    if let Err(e) = svc.shutdown() {
        // Continue shutting down other services
        error!("error shutting down service {}: {e}", svc.name());
    }
}

async fn health_of<S: Service>(service: &RwLock<S>) -> ServiceHealth {
    service.read().await.health()
}
