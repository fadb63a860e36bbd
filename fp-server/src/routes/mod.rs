//! REST endpoints, one module per resource. Everything is mounted under
//! `/api`.

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use fp_core::constants::APP_VERSION;
use fp_core::platform::Platform;
use fp_models::queries::{self, DashboardSummary};
use fp_services::send_window::business_offset;
use fp_services::ServiceHealth;

use crate::response::{ok, ApiResult};
use crate::state::AppState;

pub mod bank;
pub mod campaigns;
pub mod clients;
pub mod import;
pub mod jobs;
pub mod leads;
pub mod payments;
pub mod quotes;
pub mod sms;
pub mod staff;

/// Window for the dashboard's sent-message count.
const DASHBOARD_SMS_DAYS: i64 = 7;

/// `?status=` filter shared by the list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub host: String,
    pub services: Vec<ServiceHealth>,
}

/// GET /api/health
async fn health(State(state): State<AppState>) -> ApiResult<HealthReport> {
    let services = state.registry.health_check().await;
    let status = if services.iter().all(|s| s.healthy) { "ok" } else { "degraded" };
    ok(HealthReport {
        status,
        version: APP_VERSION,
        host: Platform::hostname(),
        services,
    })
}

/// GET /api/dashboard
async fn dashboard(State(state): State<AppState>) -> ApiResult<DashboardSummary> {
    let offset_hours = state.registry.config.read().await.automation.utc_offset_hours;
    let now = Utc::now();
    let today = now.with_timezone(&business_offset(offset_hours)).date_naive();
    let conn = state.conn()?;
    ok(queries::dashboard_summary(
        &conn,
        today,
        now - Duration::days(DASHBOARD_SMS_DAYS),
    )?)
}

/// All `/api` routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/dashboard", get(dashboard))
        .merge(clients::router())
        .merge(leads::router())
        .merge(quotes::router())
        .merge(jobs::router())
        .merge(payments::router())
        .merge(campaigns::router())
        .merge(staff::router())
        .merge(sms::router())
        .merge(import::router())
        .merge(bank::router())
}
