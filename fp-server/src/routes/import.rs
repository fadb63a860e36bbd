use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;

use fp_services::importer::{ImportEntity, ImportReport};

use crate::error::ApiError;
use crate::response::{ok, ApiResult};
use crate::state::AppState;

/// GET /api/import/{entity}/template
///
/// The template as a downloadable CSV file.
async fn template(
    State(state): State<AppState>,
    Path(entity): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entity: ImportEntity = entity.parse()?;
    let csv = state.registry.importer.read().await.template(entity).to_csv()?;
    let disposition = format!("attachment; filename=\"{entity}-template.csv\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

/// POST /api/import/{entity}
///
/// The request body is the raw CSV file.
async fn import(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    body: String,
) -> ApiResult<ImportReport> {
    let entity: ImportEntity = entity.parse()?;
    let importer = state.registry.importer.read().await;
    ok(importer.import(entity, &body)?)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/import/{entity}/template", get(template))
        .route("/import/{entity}", post(import))
}
