//! Anti-dilution adjustments to preferred conversion ratios.
//!
//! Formulas are expressed against the conversion price in effect
//! (`original_price / conversion_ratio`). For a series that has never been
//! adjusted that is simply its original price; after an adjustment it is the
//! price the next down-round has to undercut, which is what makes sequential
//! rounds compound instead of reset.

use super::{
    ensure_unique_ids, validate_dividend, CalculationPolicy, CalculationTrace, EngineError,
    EngineResult, NarrowBase,
};
use crate::domain::{
    ensure_unique_ranks, sort_by_seniority, AntiDilutionType, CapTableSnapshot, Cents, Decimal,
    DownRound, PreferredSeries, SecurityId, SeniorityRank,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Share base used for the weighted-average denominator `A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeightedAverageBasis {
    /// Fully diluted shares.
    Broad,
    /// Outstanding shares per the configured [`NarrowBase`].
    Narrow,
}

/// Adjustment of one series for one down-round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AntiDilutionAdjustment {
    pub series_id: SecurityId,
    pub series_name: String,
    /// Formula actually applied.
    pub method: AntiDilutionType,
    pub starting_conversion_ratio: Decimal,
    pub adjustment_factor: Decimal,
    pub adjusted_conversion_ratio: Decimal,
    /// Cents per share.
    pub conversion_price_before: Decimal,
    pub conversion_price_after: Decimal,
    /// Common-equivalent shares of the series at the adjusted ratio.
    pub new_preferred_shares: u64,
    /// Share of the full-ratchet increase actually granted, in [0, 1].
    pub dilution_protection: Decimal,
    pub calculation_steps: Vec<String>,
}

/// Every series against one down-round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AntiDilutionAnalysis {
    pub round_name: String,
    /// In seniority order.
    pub adjustments: Vec<AntiDilutionAdjustment>,
    /// As-converted shares of the analysed series at their starting ratios.
    pub total_dilution_without_protection: u64,
    /// As-converted shares of the analysed series at their adjusted ratios.
    pub total_dilution_with_protection: u64,
    /// `with - without`: extra common-equivalent shares the protection grants.
    pub dilution_savings: u64,
    /// Post-round fully-diluted ownership of the analysed series.
    pub ownership_without_protection: Decimal,
    pub ownership_with_protection: Decimal,
}

/// Rounds applied in sequence, each starting from the previous round's ratios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiRoundAnalysis {
    pub rounds: Vec<AntiDilutionAnalysis>,
    pub final_conversion_ratios: BTreeMap<SecurityId, Decimal>,
    pub final_cap_table: CapTableSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageTranche {
    pub series_id: SecurityId,
    pub series_name: String,
    pub seniority_rank: SeniorityRank,
    pub original_investment: Cents,
    pub preference_amount: Cents,
    pub accrued_dividends: Cents,
    pub total_claim: Cents,
    /// Exit value needed to pay this tranche and everything senior to it.
    pub cumulative_coverage: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationCoverageReport {
    pub as_of_date: NaiveDate,
    /// Most senior first.
    pub tranches: Vec<CoverageTranche>,
    pub total_claims: Cents,
}

fn validate_round(round: &DownRound) -> EngineResult<()> {
    if !round.new_price.is_positive() {
        return Err(EngineError::validation(format!(
            "{}: new price must be positive, got {} cents",
            round.name,
            round.new_price.as_i64()
        )));
    }
    if round.shares_issued == 0 {
        return Err(EngineError::validation(format!(
            "{}: shares issued must be positive",
            round.name
        )));
    }
    if !round.investment_amount.is_positive() {
        return Err(EngineError::validation(format!(
            "{}: investment amount must be positive, got {}",
            round.name, round.investment_amount
        )));
    }
    Ok(())
}

/// Validates the series and returns its conversion price in effect.
fn validate_series(series: &PreferredSeries) -> EngineResult<Decimal> {
    if !series.original_price.is_positive() {
        return Err(EngineError::validation(format!(
            "{}: original price must be positive, got {} cents",
            series.id,
            series.original_price.as_i64()
        )));
    }
    if !series.conversion_ratio.is_positive() {
        return Err(EngineError::validation(format!(
            "{}: conversion ratio must be positive, got {}",
            series.id, series.conversion_ratio
        )));
    }
    if series.liquidation_preference.is_negative() {
        return Err(EngineError::validation(format!(
            "{}: liquidation preference multiple must be non-negative, got {}",
            series.id, series.liquidation_preference
        )));
    }
    validate_dividend(&series.id, &series.dividend)?;
    series
        .conversion_price()
        .filter(|price| price.is_positive())
        .ok_or_else(|| EngineError::out_of_range("conversion price"))
}

/// `round_half_even(shares * ratio)`.
fn shares_at_ratio(shares: u64, ratio: Decimal) -> EngineResult<u64> {
    Decimal::from_u64(shares)
        .checked_mul(ratio)
        .and_then(|d| d.round_half_even().to_u64())
        .ok_or_else(|| EngineError::out_of_range("adjusted share count"))
}

fn fraction(numerator: u64, denominator: u64) -> Decimal {
    if denominator == 0 {
        return Decimal::zero();
    }
    Decimal::from_u64(numerator) / Decimal::from_u64(denominator)
}

/// Computes anti-dilution adjustments under a fixed [`CalculationPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AntiDilutionEngine {
    policy: CalculationPolicy,
}

impl AntiDilutionEngine {
    pub fn new(policy: CalculationPolicy) -> Self {
        Self { policy }
    }

    /// Full ratchet: the conversion price drops all the way to the round price.
    pub fn calculate_full_ratchet(
        &self,
        series: &PreferredSeries,
        round: &DownRound,
    ) -> EngineResult<AntiDilutionAdjustment> {
        validate_round(round)?;
        let price_before = validate_series(series)?;
        let new_price = round.new_price.to_decimal();
        let ratio = series.conversion_ratio;

        let mut trace = CalculationTrace::new();
        trace.step(format!(
            "{}: conversion price in effect = {} / {} = {} cents",
            series.name,
            series.original_price.as_i64(),
            ratio,
            price_before
        ));
        trace.step(format!("{} price = {} cents per share", round.name, new_price));

        let factor = if new_price < price_before {
            let factor = price_before / new_price;
            trace.step(format!(
                "Full ratchet adjustment factor = {} / {} = {}",
                price_before, new_price, factor
            ));
            factor
        } else {
            trace.step(format!(
                "No adjustment: round price {} is not below conversion price {}; factor = 1",
                new_price, price_before
            ));
            Decimal::one()
        };

        let adjusted = ratio
            .checked_mul(factor)
            .ok_or_else(|| EngineError::out_of_range("adjusted conversion ratio"))?;
        trace.step(format!(
            "Adjusted conversion ratio = {} x {} = {}",
            ratio, factor, adjusted
        ));

        let new_shares = shares_at_ratio(series.shares, adjusted)?;
        trace.step(format!(
            "New preferred shares (as converted) = round({} x {}) = {}",
            series.shares, adjusted, new_shares
        ));

        let protection = if factor > Decimal::one() {
            Decimal::one()
        } else {
            Decimal::zero()
        };
        trace.step(format!("Dilution protection = {}", protection));

        Ok(AntiDilutionAdjustment {
            series_id: series.id.clone(),
            series_name: series.name.clone(),
            method: AntiDilutionType::FullRatchet,
            starting_conversion_ratio: ratio,
            adjustment_factor: factor,
            adjusted_conversion_ratio: adjusted,
            conversion_price_before: price_before,
            conversion_price_after: price_before / factor,
            new_preferred_shares: new_shares,
            dilution_protection: protection,
            calculation_steps: trace.into_steps(),
        })
    }

    /// Weighted average: `factor = (A + B) / (A + C)` and the ratio is divided
    /// by the factor.
    pub fn calculate_weighted_average(
        &self,
        series: &PreferredSeries,
        round: &DownRound,
        cap_table: &CapTableSnapshot,
        basis: WeightedAverageBasis,
    ) -> EngineResult<AntiDilutionAdjustment> {
        validate_round(round)?;
        let price_before = validate_series(series)?;
        let new_price = round.new_price.to_decimal();
        let ratio = series.conversion_ratio;

        let a = Decimal::from_u64(self.base_shares(cap_table, basis));
        let b = round
            .investment_amount
            .to_decimal()
            .checked_div(price_before)
            .ok_or_else(|| EngineError::out_of_range("weighted-average B"))?;
        let c = Decimal::from_u64(round.shares_issued);

        let mut trace = CalculationTrace::new();
        trace.step(format!(
            "{}: conversion price in effect = {} / {} = {} cents",
            series.name,
            series.original_price.as_i64(),
            ratio,
            price_before
        ));
        trace.step(format!(
            "A ({}) = {} shares",
            self.base_label(basis),
            a
        ));
        trace.step(format!(
            "B = investment / conversion price = {} / {} = {}",
            round.investment_amount.as_i64(),
            price_before,
            b
        ));
        trace.step(format!("C = shares issued = {}", c));

        let factor = if new_price < price_before {
            let factor = a
                .checked_add(b)
                .zip(a.checked_add(c))
                .and_then(|(numerator, denominator)| numerator.checked_div(denominator))
                .ok_or_else(|| EngineError::out_of_range("weighted-average factor"))?;
            if !factor.is_positive() {
                return Err(EngineError::validation(format!(
                    "{}: weighted-average factor ({} + {}) / ({} + {}) rounds to zero",
                    series.id, a, b, a, c
                )));
            }
            trace.step(format!(
                "Adjustment factor = (A + B) / (A + C) = ({} + {}) / ({} + {}) = {}",
                a, b, a, c, factor
            ));
            factor
        } else {
            trace.step(format!(
                "No adjustment: round price {} is not below conversion price {}; factor = 1",
                new_price, price_before
            ));
            Decimal::one()
        };

        let adjusted = ratio
            .checked_div(factor)
            .ok_or_else(|| EngineError::out_of_range("adjusted conversion ratio"))?;
        trace.step(format!(
            "Adjusted conversion ratio = {} / {} = {}",
            ratio, factor, adjusted
        ));

        let new_shares = shares_at_ratio(series.shares, adjusted)?;
        trace.step(format!(
            "New preferred shares (as converted) = round({} x {}) = {}",
            series.shares, adjusted, new_shares
        ));

        let protection = if factor < Decimal::one() {
            // Ratchet ratio = ratio * price_before / new_price. Out of range
            // counts as no protection.
            let granted = ratio
                .checked_mul(price_before)
                .and_then(|v| v.checked_div(new_price))
                .and_then(|ratchet_ratio| {
                    let full = ratchet_ratio.checked_sub(ratio)?;
                    adjusted.checked_sub(ratio)?.checked_div(full)
                })
                .unwrap_or_else(Decimal::zero);
            let protection = granted.clamp_to(Decimal::zero(), Decimal::one());
            trace.step(format!(
                "Dilution protection = ({} - {}) / ({} x {} / {} - {}) = {}",
                adjusted, ratio, ratio, price_before, new_price, ratio, protection
            ));
            protection
        } else {
            trace.step("Dilution protection = 0");
            Decimal::zero()
        };

        let method = match basis {
            WeightedAverageBasis::Broad => AntiDilutionType::WeightedAverageBroad,
            WeightedAverageBasis::Narrow => AntiDilutionType::WeightedAverageNarrow,
        };

        Ok(AntiDilutionAdjustment {
            series_id: series.id.clone(),
            series_name: series.name.clone(),
            method,
            starting_conversion_ratio: ratio,
            adjustment_factor: factor,
            adjusted_conversion_ratio: adjusted,
            conversion_price_before: price_before,
            conversion_price_after: price_before
                .checked_mul(factor)
                .ok_or_else(|| EngineError::out_of_range("conversion price after"))?,
            new_preferred_shares: new_shares,
            dilution_protection: protection,
            calculation_steps: trace.into_steps(),
        })
    }

    /// Apply the formula named by the series' own anti-dilution type.
    pub fn adjust(
        &self,
        series: &PreferredSeries,
        round: &DownRound,
        cap_table: &CapTableSnapshot,
    ) -> EngineResult<AntiDilutionAdjustment> {
        match series.anti_dilution_type {
            AntiDilutionType::FullRatchet => self.calculate_full_ratchet(series, round),
            AntiDilutionType::WeightedAverageBroad => {
                self.calculate_weighted_average(series, round, cap_table, WeightedAverageBasis::Broad)
            }
            AntiDilutionType::WeightedAverageNarrow => self.calculate_weighted_average(
                series,
                round,
                cap_table,
                WeightedAverageBasis::Narrow,
            ),
            AntiDilutionType::None => self.unadjusted(series, round),
        }
    }

    fn unadjusted(
        &self,
        series: &PreferredSeries,
        round: &DownRound,
    ) -> EngineResult<AntiDilutionAdjustment> {
        validate_round(round)?;
        let price = validate_series(series)?;
        let ratio = series.conversion_ratio;
        let shares = shares_at_ratio(series.shares, ratio)?;

        let mut trace = CalculationTrace::new();
        trace.step(format!(
            "{}: no anti-dilution protection; conversion ratio stays {}",
            series.name, ratio
        ));
        trace.step(format!(
            "Preferred shares (as converted) = round({} x {}) = {}",
            series.shares, ratio, shares
        ));

        Ok(AntiDilutionAdjustment {
            series_id: series.id.clone(),
            series_name: series.name.clone(),
            method: AntiDilutionType::None,
            starting_conversion_ratio: ratio,
            adjustment_factor: Decimal::one(),
            adjusted_conversion_ratio: ratio,
            conversion_price_before: price,
            conversion_price_after: price,
            new_preferred_shares: shares,
            dilution_protection: Decimal::zero(),
            calculation_steps: trace.into_steps(),
        })
    }

    /// Adjust every series for one down-round and total the effect.
    pub fn analyze_anti_dilution(
        &self,
        series_list: &[PreferredSeries],
        round: &DownRound,
        cap_table: &CapTableSnapshot,
    ) -> EngineResult<AntiDilutionAnalysis> {
        let ordered = sort_by_seniority(series_list)?;
        ensure_unique_ids(series_list.iter().map(|s| &s.id), "series")?;
        validate_round(round)?;
        for series in &ordered {
            validate_series(series)?;
        }

        let adjustments = ordered
            .iter()
            .map(|series| self.adjust(series, round, cap_table))
            .collect::<EngineResult<Vec<_>>>()?;

        let mut without: u64 = 0;
        let mut with: u64 = 0;
        for (series, adjustment) in ordered.iter().zip(&adjustments) {
            let unprotected = shares_at_ratio(series.shares, adjustment.starting_conversion_ratio)?;
            without = without
                .checked_add(unprotected)
                .ok_or_else(|| EngineError::out_of_range("total preferred shares"))?;
            with = with
                .checked_add(adjustment.new_preferred_shares)
                .ok_or_else(|| EngineError::out_of_range("total preferred shares"))?;
        }

        let savings = with.checked_sub(without).ok_or_else(|| {
            EngineError::invariant(format!(
                "protected share total {} is below unprotected total {}",
                with, without
            ))
        })?;

        let post_round = cap_table
            .fully_diluted_shares
            .checked_add(round.shares_issued)
            .ok_or_else(|| EngineError::out_of_range("post-round fully diluted shares"))?;
        let post_round_protected = post_round
            .checked_add(savings)
            .ok_or_else(|| EngineError::out_of_range("post-round fully diluted shares"))?;

        Ok(AntiDilutionAnalysis {
            round_name: round.name.clone(),
            adjustments,
            total_dilution_without_protection: without,
            total_dilution_with_protection: with,
            dilution_savings: savings,
            ownership_without_protection: fraction(without, post_round),
            ownership_with_protection: fraction(with, post_round_protected),
        })
    }

    /// Apply rounds strictly in order. Each round starts from the ratios the
    /// previous round produced, and the snapshot grows by each round's new
    /// preferred shares.
    pub fn analyze_multiple_round_anti_dilution(
        &self,
        series_list: &[PreferredSeries],
        rounds: &[DownRound],
        cap_table: &CapTableSnapshot,
    ) -> EngineResult<MultiRoundAnalysis> {
        ensure_unique_ranks(series_list)?;
        ensure_unique_ids(series_list.iter().map(|s| &s.id), "series")?;
        for series in series_list {
            validate_series(series)?;
        }
        for round in rounds {
            validate_round(round)?;
        }

        let mut current: Vec<PreferredSeries> = series_list.to_vec();
        let mut snapshot = *cap_table;
        let mut analyses = Vec::with_capacity(rounds.len());

        for round in rounds {
            let analysis = self.analyze_anti_dilution(&current, round, &snapshot)?;
            let adjusted: BTreeMap<&SecurityId, Decimal> = analysis
                .adjustments
                .iter()
                .map(|a| (&a.series_id, a.adjusted_conversion_ratio))
                .collect();

            current = current
                .iter()
                .map(|series| {
                    let ratio = adjusted
                        .get(&series.id)
                        .copied()
                        .unwrap_or(series.conversion_ratio);
                    series.with_conversion_ratio(ratio)
                })
                .collect();
            snapshot = snapshot.after_preferred_issuance(round.shares_issued);
            analyses.push(analysis);
        }

        let final_conversion_ratios = current
            .iter()
            .map(|series| (series.id.clone(), series.conversion_ratio))
            .collect();

        Ok(MultiRoundAnalysis {
            rounds: analyses,
            final_conversion_ratios,
            final_cap_table: snapshot,
        })
    }

    /// Claims by seniority and the exit value each tranche needs before it
    /// is fully covered.
    pub fn calculate_liquidation_coverage(
        &self,
        series_list: &[PreferredSeries],
        as_of: NaiveDate,
    ) -> EngineResult<LiquidationCoverageReport> {
        let ordered = sort_by_seniority(series_list)?;
        for series in &ordered {
            validate_series(series)?;
        }

        let mut cumulative = Cents::ZERO;
        let mut tranches = Vec::with_capacity(ordered.len());
        for series in ordered {
            let investment = series
                .original_investment()
                .ok_or_else(|| EngineError::out_of_range("original investment"))?;
            let preference = investment
                .mul_ratio(series.liquidation_preference)
                .ok_or_else(|| EngineError::out_of_range("liquidation preference"))?;
            let accrued = series
                .dividend
                .accrued(investment, series.issuance_date, as_of, self.policy.day_count)
                .ok_or_else(|| EngineError::out_of_range("accrued dividends"))?;
            let total_claim = preference
                .checked_add(accrued)
                .ok_or_else(|| EngineError::out_of_range("total claim"))?;
            cumulative = cumulative
                .checked_add(total_claim)
                .ok_or_else(|| EngineError::out_of_range("cumulative coverage"))?;

            tranches.push(CoverageTranche {
                series_id: series.id.clone(),
                series_name: series.name.clone(),
                seniority_rank: series.seniority_rank,
                original_investment: investment,
                preference_amount: preference,
                accrued_dividends: accrued,
                total_claim,
                cumulative_coverage: cumulative,
            });
        }

        Ok(LiquidationCoverageReport {
            as_of_date: as_of,
            tranches,
            total_claims: cumulative,
        })
    }

    fn base_shares(&self, cap_table: &CapTableSnapshot, basis: WeightedAverageBasis) -> u64 {
        match basis {
            WeightedAverageBasis::Broad => cap_table.fully_diluted_shares,
            WeightedAverageBasis::Narrow => match self.policy.narrow_base {
                NarrowBase::CommonAndPreferred => cap_table
                    .common_shares
                    .saturating_add(cap_table.total_preferred_shares),
                NarrowBase::PreferredOnly => cap_table.total_preferred_shares,
            },
        }
    }

    fn base_label(&self, basis: WeightedAverageBasis) -> &'static str {
        match (basis, self.policy.narrow_base) {
            (WeightedAverageBasis::Broad, _) => "broad: fully diluted",
            (WeightedAverageBasis::Narrow, NarrowBase::CommonAndPreferred) => {
                "narrow: common + preferred"
            }
            (WeightedAverageBasis::Narrow, NarrowBase::PreferredOnly) => "narrow: preferred only",
        }
    }
}
