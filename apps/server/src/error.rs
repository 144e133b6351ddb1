use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use options_tutor_market_data::MarketDataError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    MarketData(#[from] MarketDataError),
    #[error("Not Found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    code: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_allowed_at: Option<DateTime<Utc>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut next_allowed_at = None;
        let (status, msg) = match &self {
            ApiError::MarketData(e) => match e {
                MarketDataError::LocalRateLimitExceeded {
                    next_allowed_at: at,
                    ..
                } => {
                    next_allowed_at = Some(*at);
                    (StatusCode::TOO_MANY_REQUESTS, e.to_string())
                }
                MarketDataError::ProviderRateLimited { .. } => {
                    (StatusCode::TOO_MANY_REQUESTS, e.to_string())
                }
                MarketDataError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, e.to_string()),
                MarketDataError::Persistence(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                }
                _ => (StatusCode::BAD_GATEWAY, e.to_string()),
            },
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
        };
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: msg,
            next_allowed_at,
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
