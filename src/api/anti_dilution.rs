use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::{accept, rejected, respond, AppState, ComputationResponse};
use crate::domain::{CapTableSnapshot, DownRound, PreferredSeries};
use crate::engine::{
    AntiDilutionAdjustment, AntiDilutionAnalysis, AntiDilutionEngine, LiquidationCoverageReport,
    MultiRoundAnalysis, WeightedAverageBasis,
};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullRatchetRequest {
    pub series: PreferredSeries,
    pub round: DownRound,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedAverageRequest {
    pub series: PreferredSeries,
    pub round: DownRound,
    pub cap_table: CapTableSnapshot,
    pub basis: WeightedAverageBasis,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub series: Vec<PreferredSeries>,
    pub round: DownRound,
    pub cap_table: CapTableSnapshot,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiRoundRequest {
    pub series: Vec<PreferredSeries>,
    pub rounds: Vec<DownRound>,
    pub cap_table: CapTableSnapshot,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageRequest {
    pub series: Vec<PreferredSeries>,
    pub as_of_date: NaiveDate,
}

pub async fn full_ratchet(
    State(state): State<AppState>,
    payload: Result<Json<FullRatchetRequest>, JsonRejection>,
) -> Result<Json<ComputationResponse<AntiDilutionAdjustment>>, AppError> {
    const ENDPOINT: &str = "anti_dilution.full_ratchet";
    let req = accept(payload, ENDPOINT)?;
    let adjustment = AntiDilutionEngine::new(state.policy)
        .calculate_full_ratchet(&req.series, &req.round)
        .map_err(|e| rejected(ENDPOINT, e))?;
    tracing::info!(
        series = %adjustment.series_id,
        round = %req.round.name,
        ratio = %adjustment.adjusted_conversion_ratio,
        "Full ratchet computed"
    );
    respond(adjustment)
}

pub async fn weighted_average(
    State(state): State<AppState>,
    payload: Result<Json<WeightedAverageRequest>, JsonRejection>,
) -> Result<Json<ComputationResponse<AntiDilutionAdjustment>>, AppError> {
    const ENDPOINT: &str = "anti_dilution.weighted_average";
    let req = accept(payload, ENDPOINT)?;
    let adjustment = AntiDilutionEngine::new(state.policy)
        .calculate_weighted_average(&req.series, &req.round, &req.cap_table, req.basis)
        .map_err(|e| rejected(ENDPOINT, e))?;
    tracing::info!(
        series = %adjustment.series_id,
        round = %req.round.name,
        basis = ?req.basis,
        ratio = %adjustment.adjusted_conversion_ratio,
        "Weighted average computed"
    );
    respond(adjustment)
}

pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<ComputationResponse<AntiDilutionAnalysis>>, AppError> {
    const ENDPOINT: &str = "anti_dilution.analyze";
    let req = accept(payload, ENDPOINT)?;
    let analysis = AntiDilutionEngine::new(state.policy)
        .analyze_anti_dilution(&req.series, &req.round, &req.cap_table)
        .map_err(|e| rejected(ENDPOINT, e))?;
    tracing::info!(
        round = %analysis.round_name,
        series = analysis.adjustments.len(),
        savings = analysis.dilution_savings,
        "Anti-dilution analysis computed"
    );
    respond(analysis)
}

pub async fn multi_round(
    State(state): State<AppState>,
    payload: Result<Json<MultiRoundRequest>, JsonRejection>,
) -> Result<Json<ComputationResponse<MultiRoundAnalysis>>, AppError> {
    const ENDPOINT: &str = "anti_dilution.multi_round";
    let req = accept(payload, ENDPOINT)?;
    let analysis = AntiDilutionEngine::new(state.policy)
        .analyze_multiple_round_anti_dilution(&req.series, &req.rounds, &req.cap_table)
        .map_err(|e| rejected(ENDPOINT, e))?;
    tracing::info!(
        rounds = analysis.rounds.len(),
        fully_diluted = analysis.final_cap_table.fully_diluted_shares,
        "Multi-round anti-dilution computed"
    );
    respond(analysis)
}

pub async fn coverage(
    State(state): State<AppState>,
    payload: Result<Json<CoverageRequest>, JsonRejection>,
) -> Result<Json<ComputationResponse<LiquidationCoverageReport>>, AppError> {
    const ENDPOINT: &str = "anti_dilution.coverage";
    let req = accept(payload, ENDPOINT)?;
    let report = AntiDilutionEngine::new(state.policy)
        .calculate_liquidation_coverage(&req.series, req.as_of_date)
        .map_err(|e| rejected(ENDPOINT, e))?;
    tracing::info!(
        as_of = %report.as_of_date,
        total_claims = %report.total_claims,
        "Liquidation coverage computed"
    );
    respond(report)
}
