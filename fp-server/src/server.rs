//! HTTP server: router assembly and the serve loop.

use std::future::Future;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tokio::sync::broadcast;
use tracing::{info, warn};

use fp_core::error::{FpError, FpResult};
use fp_services::event_bus::AppEvent;
use fp_services::ServiceRegistry;

use crate::routes;
use crate::state::AppState;

/// Build the full application router.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .nest("/api", routes::api_router())
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE];
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("ignoring invalid CORS origin '{o}'");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(methods)
        .allow_headers(Any)
}

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn serve<F>(registry: Arc<ServiceRegistry>, shutdown: F) -> FpResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (address, cors_origins) = {
        let config = registry.config.read().await;
        (config.bind_address(), config.server.cors_origins.clone())
    };
    let events = tokio::spawn(log_events(registry.event_bus().subscribe()));
    let app = build_router(AppState::new(registry), &cors_origins);

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| FpError::Config(format!("cannot bind {address}: {e}")))?;
    info!("REST API listening on http://{address}");

    let result = axum::serve(listener, app).with_graceful_shutdown(shutdown).await;
    events.abort();
    result?;
    info!("REST API stopped");
    Ok(())
}

/// Write each service event to the log until the bus closes.
async fn log_events(mut rx: broadcast::Receiver<AppEvent>) {
    loop {
        match rx.recv().await {
            Ok(AppEvent::SmsFailed { to, error, .. }) => warn!(to = %to, "sms failed: {error}"),
            Ok(event) => info!(event = event.kind(), "{event:?}"),
            Err(broadcast::error::RecvError::Lagged(n)) => warn!("event log skipped {n} event(s)"),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
