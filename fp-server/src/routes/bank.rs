use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use fp_models::models::bank::TransactionFilter;
use fp_models::queries::StaffExpense;
use fp_models::{BankAccount, BankTransaction};
use fp_services::reconciliation::{AllocationReport, CsvColumnMapping, SyncReport, UploadReport};

use crate::response::{ok, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
struct SyncQuery {
    since: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
struct DateRange {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

/// `staffMemberId: null` clears the allocation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllocateRequest {
    staff_member_id: Option<i64>,
}

/// GET /api/bank/accounts
async fn list_accounts(State(state): State<AppState>) -> ApiResult<Vec<BankAccount>> {
    let reconciliation = state.registry.reconciliation.read().await;
    ok(reconciliation.accounts()?)
}

/// POST /api/bank/sync?since=YYYY-MM-DD
async fn sync(State(state): State<AppState>, Query(query): Query<SyncQuery>) -> ApiResult<SyncReport> {
    let reconciliation = state.registry.reconciliation.read().await;
    ok(reconciliation.sync_open_banking(query.since).await?)
}

/// GET /api/bank/transactions?from=&to=&allocationStatus=&staffMemberId=&limit=
async fn list_transactions(
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult<Vec<BankTransaction>> {
    let reconciliation = state.registry.reconciliation.read().await;
    ok(reconciliation.transactions(&filter)?)
}

/// POST /api/bank/transactions/upload?date=&description=&amount=&debit=&credit=&direction=&card=
///
/// The request body is the statement CSV; query parameters name its columns.
async fn upload(
    State(state): State<AppState>,
    Query(mapping): Query<CsvColumnMapping>,
    body: String,
) -> ApiResult<UploadReport> {
    let reconciliation = state.registry.reconciliation.read().await;
    ok(reconciliation.import_csv(&body, &mapping)?)
}

/// POST /api/bank/transactions/auto-allocate
async fn auto_allocate(State(state): State<AppState>) -> ApiResult<AllocationReport> {
    let reconciliation = state.registry.reconciliation.read().await;
    ok(reconciliation.auto_allocate()?)
}

/// POST /api/bank/transactions/{id}/allocate
async fn allocate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<AllocateRequest>,
) -> ApiResult<BankTransaction> {
    let reconciliation = state.registry.reconciliation.read().await;
    let tx = match request.staff_member_id {
        Some(staff_id) => reconciliation.allocate(id, staff_id)?,
        None => reconciliation.unallocate(id)?,
    };
    ok(tx)
}

/// GET /api/bank/staff-summary?from=&to=
async fn staff_summary(
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> ApiResult<Vec<StaffExpense>> {
    let reconciliation = state.registry.reconciliation.read().await;
    ok(reconciliation.staff_summary(range.from, range.to)?)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bank/accounts", get(list_accounts))
        .route("/bank/sync", post(sync))
        .route("/bank/transactions", get(list_transactions))
        .route("/bank/transactions/upload", post(upload))
        .route("/bank/transactions/auto-allocate", post(auto_allocate))
        .route("/bank/transactions/{id}/allocate", post(allocate))
        .route("/bank/staff-summary", get(staff_summary))
}
