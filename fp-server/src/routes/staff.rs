use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use fp_core::error::FpError;
use fp_models::StaffMember;

use crate::response::{ok, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StaffQuery {
    #[serde(default)]
    active_only: bool,
}

/// GET /api/staff?activeOnly=
async fn list_staff(
    State(state): State<AppState>,
    Query(query): Query<StaffQuery>,
) -> ApiResult<Vec<StaffMember>> {
    let conn = state.conn()?;
    ok(StaffMember::load_all(&conn, query.active_only)?)
}

/// POST /api/staff
async fn create_staff(
    State(state): State<AppState>,
    Json(mut staff): Json<StaffMember>,
) -> ApiResult<StaffMember> {
    staff.id = None;
    let conn = state.conn()?;
    staff.save(&conn)?;
    ok(staff)
}

/// GET /api/staff/{id}
async fn get_staff(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StaffMember> {
    let conn = state.conn()?;
    ok(StaffMember::get(&conn, id)?)
}

/// PUT /api/staff/{id}
async fn update_staff(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut staff): Json<StaffMember>,
) -> ApiResult<StaffMember> {
    let conn = state.conn()?;
    staff.created_at = StaffMember::get(&conn, id)?.created_at;
    staff.id = Some(id);
    staff.save(&conn)?;
    ok(staff)
}

/// DELETE /api/staff/{id}
async fn delete_staff(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    let conn = state.conn()?;
    if !StaffMember::delete(&conn, id)? {
        return Err(FpError::not_found("staff member", id).into());
    }
    ok(())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/staff", get(list_staff).post(create_staff))
        .route("/staff/{id}", get(get_staff).put(update_staff).delete(delete_staff))
}
