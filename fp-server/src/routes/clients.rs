use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use fp_core::constants::entity;
use fp_core::error::FpError;
use fp_models::Client;

use crate::response::{ok, ApiResult};
use crate::state::AppState;

/// GET /api/clients
async fn list_clients(State(state): State<AppState>) -> ApiResult<Vec<Client>> {
    let conn = state.conn()?;
    ok(Client::load_all(&conn)?)
}

/// POST /api/clients
async fn create_client(
    State(state): State<AppState>,
    Json(mut client): Json<Client>,
) -> ApiResult<Client> {
    client.id = None;
    let conn = state.conn()?;
    client.save(&conn)?;
    ok(client)
}

/// GET /api/clients/{id}
async fn get_client(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Client> {
    let conn = state.conn()?;
    ok(Client::get(&conn, id)?)
}

/// PUT /api/clients/{id}
async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut client): Json<Client>,
) -> ApiResult<Client> {
    let conn = state.conn()?;
    let existing = Client::get(&conn, id)?;
    client.id = Some(id);
    client.created_at = existing.created_at;
    client.save(&conn)?;
    ok(client)
}

/// DELETE /api/clients/{id}
async fn delete_client(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    let conn = state.conn()?;
    if !Client::delete(&conn, id)? {
        return Err(FpError::not_found(entity::CLIENT, id).into());
    }
    ok(())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/clients", get(list_clients).post(create_client))
        .route(
            "/clients/{id}",
            get(get_client).put(update_client).delete(delete_client),
        )
}
