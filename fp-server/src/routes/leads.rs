use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use fp_core::constants::entity;
use fp_core::error::FpError;
use fp_models::Lead;

use super::StatusFilter;
use crate::response::{ok, ApiResult};
use crate::state::AppState;

/// GET /api/leads?status=
async fn list_leads(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Vec<Lead>> {
    let conn = state.conn()?;
    ok(Lead::load_all(&conn, filter.status.as_deref())?)
}

/// POST /api/leads
async fn create_lead(State(state): State<AppState>, Json(mut lead): Json<Lead>) -> ApiResult<Lead> {
    lead.id = None;
    let conn = state.conn()?;
    lead.save(&conn)?;
    ok(lead)
}

/// GET /api/leads/{id}
async fn get_lead(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Lead> {
    let conn = state.conn()?;
    ok(Lead::get(&conn, id)?)
}

/// PUT /api/leads/{id}
async fn update_lead(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut lead): Json<Lead>,
) -> ApiResult<Lead> {
    let conn = state.conn()?;
    // created_at drives the welcome campaign, so it is never taken from the body.
    lead.created_at = Lead::get(&conn, id)?.created_at;
    lead.id = Some(id);
    lead.save(&conn)?;
    ok(lead)
}

/// DELETE /api/leads/{id}
async fn delete_lead(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    let conn = state.conn()?;
    if !Lead::delete(&conn, id)? {
        return Err(FpError::not_found(entity::LEAD, id).into());
    }
    ok(())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/leads", get(list_leads).post(create_lead))
        .route("/leads/{id}", get(get_lead).put(update_lead).delete(delete_lead))
}
