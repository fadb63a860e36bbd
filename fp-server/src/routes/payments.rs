use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use fp_core::constants::entity;
use fp_core::error::FpError;
use fp_models::Payment;

use super::StatusFilter;
use crate::response::{ok, ApiResult};
use crate::state::AppState;

/// GET /api/payments?status=
async fn list_payments(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Vec<Payment>> {
    let conn = state.conn()?;
    ok(Payment::load_all(&conn, filter.status.as_deref())?)
}

/// POST /api/payments
async fn create_payment(
    State(state): State<AppState>,
    Json(mut payment): Json<Payment>,
) -> ApiResult<Payment> {
    payment.id = None;
    let conn = state.conn()?;
    payment.save(&conn)?;
    ok(payment)
}

/// GET /api/payments/{id}
async fn get_payment(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Payment> {
    let conn = state.conn()?;
    ok(Payment::get(&conn, id)?)
}

/// PUT /api/payments/{id}
async fn update_payment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut payment): Json<Payment>,
) -> ApiResult<Payment> {
    let conn = state.conn()?;
    payment.created_at = Payment::get(&conn, id)?.created_at;
    payment.id = Some(id);
    payment.save(&conn)?;
    ok(payment)
}

/// DELETE /api/payments/{id}
async fn delete_payment(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    let conn = state.conn()?;
    if !Payment::delete(&conn, id)? {
        return Err(FpError::not_found(entity::PAYMENT, id).into());
    }
    ok(())
}

/// POST /api/payments/{id}/mark-paid
async fn mark_paid(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Payment> {
    let conn = state.conn()?;
    ok(Payment::mark_paid(&conn, id, Utc::now())?)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments", get(list_payments).post(create_payment))
        .route(
            "/payments/{id}",
            get(get_payment).put(update_payment).delete(delete_payment),
        )
        .route("/payments/{id}/mark-paid", post(mark_paid))
}
