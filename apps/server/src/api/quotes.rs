use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use options_tutor_market_data::{CompanyOverview, HistoricalSeries, Quote, RefreshReport};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

fn require_symbol(symbol: &str) -> ApiResult<&str> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() || trimmed.len() > 16 {
        return Err(ApiError::BadRequest(format!("Invalid symbol '{}'", symbol)));
    }
    Ok(trimmed)
}

/// Every cached quote; never triggers a fetch.
async fn list_quotes(State(state): State<Arc<AppState>>) -> Json<Vec<Quote>> {
    Json(state.market_data.cached_quotes())
}

async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Quote>> {
    let symbol = require_symbol(&symbol)?;
    Ok(Json(state.market_data.get_quote(symbol).await))
}

async fn get_historical(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<HistoricalSeries>> {
    let symbol = require_symbol(&symbol)?;
    Ok(Json(state.market_data.get_historical(symbol).await))
}

async fn get_company(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<CompanyOverview>> {
    let symbol = require_symbol(&symbol)?;
    state
        .market_data
        .get_company(symbol)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn refresh_symbol(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<RefreshReport>> {
    let symbol = require_symbol(&symbol)?;
    let report = state.market_data.force_refresh(symbol).await?;
    Ok(Json(report))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quotes", get(list_quotes))
        .route("/quotes/{symbol}", get(get_quote))
        .route("/historical/{symbol}", get(get_historical))
        .route("/company/{symbol}", get(get_company))
        .route("/refresh/{symbol}", post(refresh_symbol))
}
