use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use fp_core::error::FpError;
use fp_models::Campaign;

use crate::response::{ok, ApiResult};
use crate::state::AppState;

/// A saved campaign plus any template placeholders that will not render.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCampaign {
    pub campaign: Campaign,
    pub unknown_placeholders: Vec<String>,
}

/// GET /api/campaigns
async fn list_campaigns(State(state): State<AppState>) -> ApiResult<Vec<Campaign>> {
    let automation = state.registry.automation.read().await;
    ok(automation.campaigns()?)
}

/// POST /api/campaigns
async fn create_campaign(
    State(state): State<AppState>,
    Json(mut campaign): Json<Campaign>,
) -> ApiResult<SavedCampaign> {
    campaign.id = None;
    let automation = state.registry.automation.read().await;
    let unknown_placeholders = automation.save_campaign(&mut campaign)?;
    ok(SavedCampaign { campaign, unknown_placeholders })
}

/// GET /api/campaigns/{id}
async fn get_campaign(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Campaign> {
    let conn = state.conn()?;
    ok(Campaign::get(&conn, id)?)
}

/// PUT /api/campaigns/{id}
async fn update_campaign(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut campaign): Json<Campaign>,
) -> ApiResult<SavedCampaign> {
    {
        let conn = state.conn()?;
        campaign.created_at = Campaign::get(&conn, id)?.created_at;
    }
    campaign.id = Some(id);
    let automation = state.registry.automation.read().await;
    let unknown_placeholders = automation.save_campaign(&mut campaign)?;
    ok(SavedCampaign { campaign, unknown_placeholders })
}

/// DELETE /api/campaigns/{id}
async fn delete_campaign(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    let conn = state.conn()?;
    if !Campaign::delete(&conn, id)? {
        return Err(FpError::not_found("campaign", id).into());
    }
    ok(())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route(
            "/campaigns/{id}",
            get(get_campaign).put(update_campaign).delete(delete_campaign),
        )
}
