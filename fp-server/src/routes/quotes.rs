use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tracing::info;

use fp_core::constants::entity;
use fp_core::error::FpError;
use fp_models::{Job, Quote};

use super::StatusFilter;
use crate::response::{ok, ApiResult};
use crate::state::AppState;

/// GET /api/quotes?status=
async fn list_quotes(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Vec<Quote>> {
    let conn = state.conn()?;
    ok(Quote::load_all(&conn, filter.status.as_deref())?)
}

/// POST /api/quotes
async fn create_quote(
    State(state): State<AppState>,
    Json(mut quote): Json<Quote>,
) -> ApiResult<Quote> {
    quote.id = None;
    let conn = state.conn()?;
    quote.save(&conn)?;
    ok(quote)
}

/// GET /api/quotes/{id}
async fn get_quote(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Quote> {
    let conn = state.conn()?;
    ok(Quote::get(&conn, id)?)
}

/// PUT /api/quotes/{id}
///
/// The number and send time are kept from the stored quote; use the send
/// action to move a quote to `sent`.
async fn update_quote(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut quote): Json<Quote>,
) -> ApiResult<Quote> {
    let conn = state.conn()?;
    let existing = Quote::get(&conn, id)?;
    quote.id = Some(id);
    quote.quote_number = existing.quote_number;
    quote.sent_at = existing.sent_at;
    quote.created_at = existing.created_at;
    quote.save(&conn)?;
    ok(quote)
}

/// DELETE /api/quotes/{id}
async fn delete_quote(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    let conn = state.conn()?;
    if !Quote::delete(&conn, id)? {
        return Err(FpError::not_found(entity::QUOTE, id).into());
    }
    ok(())
}

/// POST /api/quotes/{id}/send
async fn send_quote(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Quote> {
    let conn = state.conn()?;
    let quote = Quote::mark_sent(&conn, id, Utc::now())?;
    info!("quote {} marked sent", quote.quote_number);
    ok(quote)
}

/// POST /api/quotes/{id}/accept
async fn accept_quote(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Job> {
    let job = state.database().transaction(|conn| Quote::accept(conn, id))?;
    info!("quote {id} accepted, opened job {}", job.job_number);
    ok(job)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quotes", get(list_quotes).post(create_quote))
        .route("/quotes/{id}", get(get_quote).put(update_quote).delete(delete_quote))
        .route("/quotes/{id}/send", post(send_quote))
        .route("/quotes/{id}/accept", post(accept_quote))
}
