use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use options_tutor_market_data::FetchPermit;

use crate::main_lib::AppState;

async fn healthz() -> &'static str {
    "ok"
}

/// Current limiter status; does not consume quota.
async fn get_rate_limit(State(state): State<Arc<AppState>>) -> Json<FetchPermit> {
    Json(state.market_data.rate_status())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/rate-limit", get(get_rate_limit))
}
