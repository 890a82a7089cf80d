use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::{accept, rejected, respond, AppState, ComputationResponse};
use crate::domain::{CommonShareClass, LiquidationEvent, PreferredShareClass};
use crate::engine::{WaterfallEngine, WaterfallResult};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterfallRequest {
    pub preferred: Vec<PreferredShareClass>,
    #[serde(default)]
    pub common: Vec<CommonShareClass>,
    pub event: LiquidationEvent,
}

pub async fn run_waterfall(
    State(state): State<AppState>,
    payload: Result<Json<WaterfallRequest>, JsonRejection>,
) -> Result<Json<ComputationResponse<WaterfallResult>>, AppError> {
    const ENDPOINT: &str = "waterfall";
    let req = accept(payload, ENDPOINT)?;
    let result = WaterfallEngine::new(state.policy)
        .run(&req.preferred, &req.common, &req.event)
        .map_err(|e| rejected(ENDPOINT, e))?;
    tracing::info!(
        exit_value = %result.exit_value,
        event_type = ?req.event.event_type,
        preferred_classes = result.preferred.len(),
        distributed = %result.summary.total_distributed,
        "Waterfall computed"
    );
    respond(result)
}
