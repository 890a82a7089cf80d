pub mod anti_dilution;
pub mod health;
pub mod safe;
pub mod waterfall;

use crate::config::Config;
use crate::domain::result_digest;
use crate::engine::{CalculationPolicy, EngineError};
use crate::error::AppError;
use axum::extract::rejection::JsonRejection;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub policy: CalculationPolicy,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            policy: config.policy(),
        }
    }
}

/// Engine result plus the digest of its JSON encoding.
#[derive(Debug, Serialize)]
pub struct ComputationResponse<T> {
    pub result: T,
    pub digest: String,
}

pub(crate) fn respond<T: Serialize>(result: T) -> Result<Json<ComputationResponse<T>>, AppError> {
    let digest = result_digest(&result)?;
    Ok(Json(ComputationResponse { result, digest }))
}

/// Unwrap a JSON body, turning malformed input into a 400.
pub(crate) fn accept<T>(
    payload: Result<Json<T>, JsonRejection>,
    endpoint: &'static str,
) -> Result<T, AppError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            tracing::warn!(endpoint, error = %rejection.body_text(), "Malformed request body");
            Err(AppError::BadRequest(rejection.body_text()))
        }
    }
}

pub(crate) fn rejected(endpoint: &'static str, err: EngineError) -> AppError {
    tracing::warn!(endpoint, error = %err, "Computation rejected");
    err.into()
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/anti-dilution/full-ratchet",
            post(anti_dilution::full_ratchet),
        )
        .route(
            "/v1/anti-dilution/weighted-average",
            post(anti_dilution::weighted_average),
        )
        .route("/v1/anti-dilution/analyze", post(anti_dilution::analyze))
        .route(
            "/v1/anti-dilution/multi-round",
            post(anti_dilution::multi_round),
        )
        .route("/v1/anti-dilution/coverage", post(anti_dilution::coverage))
        .route("/v1/waterfall", post(waterfall::run_waterfall))
        .route("/v1/safe/convert", post(safe::convert))
        .route("/v1/safe/mfn", post(safe::most_favored_nation))
        .route("/v1/safe/analyze", post(safe::analyze))
        .route("/v1/safe/liquidity-event", post(safe::liquidity_event))
        .layer(cors)
        .with_state(state)
}
