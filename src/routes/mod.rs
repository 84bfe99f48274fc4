// HTTP routes

mod auth;
mod error;
mod http;

pub use error::ApiError;
pub use http::{NAME, VERSION};

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::account_repo::AccountRepo;
use crate::config::SecurityConfig;
use crate::coordinator::RunCoordinator;
use crate::run_repo::RunRepo;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) accounts: Arc<AccountRepo>,
    pub(crate) runs: Arc<RunRepo>,
    pub(crate) coordinator: Arc<RunCoordinator>,
    pub(crate) security: Arc<SecurityConfig>,
}

pub fn app(
    accounts: Arc<AccountRepo>,
    runs: Arc<RunRepo>,
    coordinator: Arc<RunCoordinator>,
    security: SecurityConfig,
) -> Router {
    let state = AppState {
        accounts,
        runs,
        coordinator,
        security: Arc::new(security),
    };

    let guarded = Router::new()
        .route(
            "/accounts",
            get(http::list_accounts).post(http::create_account),
        ) // GET, POST /accounts
        .route("/accounts/{id}/runs", get(http::list_account_runs)) // GET /accounts/{id}/runs
        .route(
            "/analyze/{id}",
            get(http::get_run).post(http::run_cost_analysis),
        ) // GET /analyze/{run_id}, POST /analyze/{account_id}
        .route("/analyze/{id}/resources", post(http::run_resource_analysis)) // POST /analyze/{account_id}/resources
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/", get(|| async { "costwise is running" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .merge(guarded)
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
