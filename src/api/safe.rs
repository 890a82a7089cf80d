use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Deserialize;

use crate::api::{accept, rejected, respond, ComputationResponse};
use crate::domain::{CapTableSnapshot, EquityRound, LiquidationEvent, SafeNote};
use crate::engine::{
    apply_most_favored_nation, SafeBatchAnalysis, SafeConversionEngine, SafeConversionResult,
    SafeLiquidityAnalysis,
};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    pub note: SafeNote,
    pub round: EquityRound,
    pub existing_shares_at_cap: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MfnRequest {
    pub notes: Vec<SafeNote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub notes: Vec<SafeNote>,
    pub round: EquityRound,
    pub cap_table: CapTableSnapshot,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityEventRequest {
    pub notes: Vec<SafeNote>,
    pub event: LiquidationEvent,
    pub cap_table: CapTableSnapshot,
}

pub async fn convert(
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<ComputationResponse<SafeConversionResult>>, AppError> {
    const ENDPOINT: &str = "safe.convert";
    let req = accept(payload, ENDPOINT)?;
    let result = SafeConversionEngine::new()
        .convert_safe_in_equity_round(&req.note, &req.round, req.existing_shares_at_cap)
        .map_err(|e| rejected(ENDPOINT, e))?;
    tracing::info!(
        note = %result.note_id,
        round = %req.round.name,
        price = %result.conversion_price,
        shares = result.shares_received,
        "SAFE conversion computed"
    );
    respond(result)
}

pub async fn most_favored_nation(
    payload: Result<Json<MfnRequest>, JsonRejection>,
) -> Result<Json<ComputationResponse<Vec<SafeNote>>>, AppError> {
    const ENDPOINT: &str = "safe.mfn";
    let req = accept(payload, ENDPOINT)?;
    let notes = apply_most_favored_nation(&req.notes).map_err(|e| rejected(ENDPOINT, e))?;
    let adjustments: usize = notes.iter().map(|n| n.mfn_adjustments.len()).sum();
    tracing::info!(notes = notes.len(), adjustments, "MFN cascade computed");
    respond(notes)
}

pub async fn analyze(
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<ComputationResponse<SafeBatchAnalysis>>, AppError> {
    const ENDPOINT: &str = "safe.analyze";
    let req = accept(payload, ENDPOINT)?;
    let analysis = SafeConversionEngine::new()
        .analyze_safe_conversions(&req.notes, &req.round, &req.cap_table)
        .map_err(|e| rejected(ENDPOINT, e))?;
    tracing::info!(
        round = %analysis.round_name,
        converted = analysis.conversions.len(),
        skipped = analysis.skipped_note_ids.len(),
        ownership = %analysis.total_ownership_to_safes,
        "SAFE batch conversion computed"
    );
    respond(analysis)
}

pub async fn liquidity_event(
    payload: Result<Json<LiquidityEventRequest>, JsonRejection>,
) -> Result<Json<ComputationResponse<SafeLiquidityAnalysis>>, AppError> {
    const ENDPOINT: &str = "safe.liquidity_event";
    let req = accept(payload, ENDPOINT)?;
    let analysis = SafeConversionEngine::new()
        .convert_safes_in_liquidity_event(&req.notes, &req.event, &req.cap_table)
        .map_err(|e| rejected(ENDPOINT, e))?;
    tracing::info!(
        exit_value = %analysis.exit_value,
        notes = analysis.conversions.len(),
        implied = %analysis.total_implied_value,
        "SAFE liquidity event computed"
    );
    respond(analysis)
}
