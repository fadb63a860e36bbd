use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::Utc;
use serde::Deserialize;

use fp_models::SmsLog;
use fp_services::automation::{ManualSms, PassReport};

use crate::error::ApiError;
use crate::response::{ok, ApiResult};
use crate::state::AppState;

const DEFAULT_LOG_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogQuery {
    limit: Option<i64>,
    entity_type: Option<String>,
    entity_id: Option<i64>,
}

/// Twilio's inbound message webhook, form encoded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InboundSms {
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    message_sid: Option<String>,
}

/// GET /api/sms/logs?limit=&entityType=&entityId=
async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> ApiResult<Vec<SmsLog>> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, 1000);
    let entity = match (query.entity_type.as_deref(), query.entity_id) {
        (Some(t), Some(id)) => Some((t, id)),
        _ => None,
    };
    let automation = state.registry.automation.read().await;
    ok(automation.recent_logs(limit, entity)?)
}

/// POST /api/sms/send
async fn send_sms(
    State(state): State<AppState>,
    Json(request): Json<ManualSms>,
) -> ApiResult<SmsLog> {
    let automation = state.registry.automation.read().await;
    ok(automation.send_manual(&request).await?)
}

/// POST /api/sms/inbound
///
/// Answers with an empty TwiML document so the provider sends no reply.
async fn inbound_sms(
    State(state): State<AppState>,
    Form(inbound): Form<InboundSms>,
) -> Result<impl IntoResponse, ApiError> {
    let automation = state.registry.automation.read().await;
    automation.record_inbound(&inbound.from, &inbound.to, &inbound.body, inbound.message_sid)?;
    Ok((
        [(header::CONTENT_TYPE, "application/xml")],
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response></Response>",
    ))
}

/// POST /api/automation/run
async fn run_automation(State(state): State<AppState>) -> ApiResult<PassReport> {
    let automation = state.registry.automation.read().await;
    ok(automation.run_pass(Utc::now()).await?)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sms/logs", get(list_logs))
        .route("/sms/send", post(send_sms))
        .route("/sms/inbound", post(inbound_sms))
        .route("/automation/run", post(run_automation))
}
