use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fp_core::constants::entity;
use fp_core::error::FpError;
use fp_models::{BomItem, Job, JobBom, JobSection};

use super::StatusFilter;
use crate::response::{ok, ApiResult};
use crate::state::AppState;

/// A job with its derived progress.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    pub in_production: bool,
    pub progress_percent: u8,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            in_production: job.is_in_production(),
            progress_percent: job.progress_percent(),
            job,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BomView {
    pub job_id: i64,
    pub items: Vec<BomItem>,
    pub total_cost: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct BomUpdate {
    pub items: Vec<BomItem>,
}

/// GET /api/jobs?status=
async fn list_jobs(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Vec<JobView>> {
    let conn = state.conn()?;
    let jobs = Job::load_all(&conn, filter.status.as_deref())?;
    ok(jobs.into_iter().map(JobView::from).collect())
}

/// POST /api/jobs
async fn create_job(State(state): State<AppState>, Json(mut job): Json<Job>) -> ApiResult<JobView> {
    job.id = None;
    let conn = state.conn()?;
    job.save(&conn)?;
    ok(job.into())
}

/// GET /api/jobs/{id}
async fn get_job(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<JobView> {
    let conn = state.conn()?;
    ok(Job::get(&conn, id)?.into())
}

/// PUT /api/jobs/{id}
async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut job): Json<Job>,
) -> ApiResult<JobView> {
    let conn = state.conn()?;
    let existing = Job::get(&conn, id)?;
    job.id = Some(id);
    job.job_number = existing.job_number;
    job.created_at = existing.created_at;
    job.save(&conn)?;
    ok(job.into())
}

/// DELETE /api/jobs/{id}
async fn delete_job(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    let conn = state.conn()?;
    if !Job::delete(&conn, id)? {
        return Err(FpError::not_found(entity::JOB, id).into());
    }
    ok(())
}

/// POST /api/jobs/{id}/sections/{section}/complete
async fn complete_section(
    State(state): State<AppState>,
    Path((id, section)): Path<(i64, String)>,
) -> ApiResult<JobView> {
    let section: JobSection = section.parse()?;
    let conn = state.conn()?;
    ok(Job::complete_section(&conn, id, section)?.into())
}

/// GET /api/jobs/{id}/bom
async fn get_bom(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<BomView> {
    let conn = state.conn()?;
    Job::get(&conn, id)?;
    let view = match JobBom::find_for_job(&conn, id)? {
        Some(bom) => BomView {
            job_id: id,
            total_cost: bom.total_cost(),
            items: bom.items,
        },
        None => BomView {
            job_id: id,
            items: Vec::new(),
            total_cost: Decimal::ZERO,
        },
    };
    ok(view)
}

/// PUT /api/jobs/{id}/bom
async fn put_bom(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<BomUpdate>,
) -> ApiResult<BomView> {
    let conn = state.conn()?;
    let bom = JobBom::upsert(&conn, id, update.items)?;
    ok(BomView {
        job_id: id,
        total_cost: bom.total_cost(),
        items: bom.items,
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/{id}", get(get_job).put(update_job).delete(delete_job))
        .route("/jobs/{id}/sections/{section}/complete", post(complete_section))
        .route("/jobs/{id}/bom", get(get_bom).put(put_bom))
}
