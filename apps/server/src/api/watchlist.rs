use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use options_tutor_market_data::FetchJob;
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WatchRequest {
    symbol: String,
}

async fn get_watchlist(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.scheduler.watchlist())
}

async fn add_to_watchlist(
    State(state): State<Arc<AppState>>,
    Json(body): Json<WatchRequest>,
) -> ApiResult<(StatusCode, Json<Vec<String>>)> {
    if body.symbol.trim().is_empty() {
        return Err(ApiError::BadRequest("symbol is required".into()));
    }
    let status = if state.scheduler.watch(&body.symbol) {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(state.scheduler.watchlist())))
}

async fn remove_from_watchlist(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<StatusCode> {
    if state.scheduler.unwatch(&symbol) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<FetchJob>> {
    Json(state.scheduler.jobs())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/watchlist", get(get_watchlist).post(add_to_watchlist))
        .route("/watchlist/{symbol}", delete(remove_from_watchlist))
        .route("/jobs", get(list_jobs))
}
