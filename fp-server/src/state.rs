//! Shared handler state.

use std::sync::Arc;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;

use fp_core::error::FpResult;
use fp_models::Database;
use fp_services::ServiceRegistry;

/// Cloned into every handler. All services live in the registry.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServiceRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    pub fn database(&self) -> &Database {
        &self.registry.database
    }

    /// A pooled connection. Never hold one across an `.await`.
    pub fn conn(&self) -> FpResult<PooledConnection<SqliteConnectionManager>> {
        self.registry.database.conn()
    }
}
