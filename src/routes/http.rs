// HTTP handlers: version, account registration, analysis runs.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::AppState;
use super::error::ApiError;
use crate::models::{AccountRecord, AnalysisRun, NewAccount, rank_findings};

/// Package version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name (from Cargo.toml).
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// GET /version: service name and version.
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// POST /accounts: register an account. Secrets are encrypted before they touch the store.
pub(super) async fn create_account(
    State(state): State<AppState>,
    body: Result<Json<NewAccount>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountRecord>), ApiError> {
    let Json(new) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    for (field, value) in [
        ("accountName", &new.account_name),
        ("accountId", &new.account_id),
        ("region", &new.region),
        ("accessKey", &new.access_key),
        ("secretKey", &new.secret_key),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::BadRequest(format!("{} must be non-empty", field)));
        }
    }
    let record = state.accounts.create(&new).await?;
    tracing::info!(id = record.id, account_id = %record.account_id, "account registered");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /accounts: active accounts.
pub(super) async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountRecord>>, ApiError> {
    Ok(Json(state.accounts.list_active().await?))
}

const DEFAULT_RUN_HISTORY: u32 = 20;
const MAX_RUN_HISTORY: u32 = 200;

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    limit: Option<u32>,
}

/// GET /accounts/{id}/runs?limit=N: recent runs for account `id`, newest first, without findings.
pub(super) async fn list_account_runs(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<AnalysisRun>>, ApiError> {
    let record = find_account(&state, id).await?;
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RUN_HISTORY)
        .clamp(1, MAX_RUN_HISTORY);
    Ok(Json(state.runs.list_runs(&record.account_id, limit).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DateRange {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

/// POST /analyze/{id}?startDate=..&endDate=..: cost aggregation for account `id`.
pub(super) async fn run_cost_analysis(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    range: Result<Query<DateRange>, QueryRejection>,
) -> Result<Json<AnalysisRun>, ApiError> {
    let record = find_account(&state, id).await?;
    let Query(range) = range.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if range.start_date >= range.end_date {
        return Err(ApiError::BadRequest(format!(
            "startDate {} must be before endDate {}",
            range.start_date, range.end_date
        )));
    }

    let run = state
        .coordinator
        .run_analysis(&record.to_account(), range.start_date, range.end_date)
        .await;
    mark_analyzed(&state, &record).await;
    Ok(Json(run))
}

/// POST /analyze/{id}/resources: resource rules for account `id`.
pub(super) async fn run_resource_analysis(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<AnalysisRun>, ApiError> {
    let record = find_account(&state, id).await?;
    let run = state
        .coordinator
        .track_resource_analysis(&record.to_account(), Utc::now())
        .await;
    mark_analyzed(&state, &record).await;
    Ok(Json(run))
}

/// GET /analyze/{id}: persisted run `id`, findings most urgent first.
pub(super) async fn get_run(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<AnalysisRun>, ApiError> {
    let Path(id) = id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let mut run = state
        .runs
        .get_run(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("run {}", id)))?;
    rank_findings(&mut run.findings);
    Ok(Json(run))
}

async fn find_account(
    state: &AppState,
    id: Result<Path<i64>, PathRejection>,
) -> Result<AccountRecord, ApiError> {
    let Path(id) = id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    state
        .accounts
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("account {}", id)))
}

async fn mark_analyzed(state: &AppState, record: &AccountRecord) {
    if let Err(e) = state.accounts.mark_analyzed(record.id, Utc::now()).await {
        tracing::warn!(error = %e, account = record.id, "failed to record analysis time");
    }
}
