//! Pure computation engines for cap-table calculations.
//!
//! Every engine call is synchronous, performs no I/O and never mutates its
//! inputs: adjustments, conversions and distributions are returned as new
//! values. Identical inputs produce identical outputs.

use crate::domain::{DayCount, DividendPolicy, SecurityId};
use serde::{Deserialize, Serialize};

pub mod anti_dilution;
pub mod error;
pub mod mfn;
pub mod safe;
pub mod trace;
pub mod waterfall;

pub use anti_dilution::{
    AntiDilutionAdjustment, AntiDilutionAnalysis, AntiDilutionEngine, CoverageTranche,
    LiquidationCoverageReport, MultiRoundAnalysis, WeightedAverageBasis,
};
pub use error::{EngineError, EngineResult};
pub use mfn::apply_most_favored_nation;
pub use safe::{
    PriceBasis, ProRataAnalysis, SafeBatchAnalysis, SafeConversionEngine, SafeConversionResult,
    SafeLiquidityAnalysis,
};
pub use trace::CalculationTrace;
pub use waterfall::{
    CommonDistribution, ConversionChoice, PreferredDistribution, PreferredVsCommon,
    WaterfallEngine, WaterfallResult, WaterfallSummary,
};

/// Which shares form the base `A` of a narrow-based weighted average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrowBase {
    /// Outstanding common plus outstanding preferred.
    #[default]
    CommonAndPreferred,
    /// Outstanding preferred only.
    PreferredOnly,
}

/// Term-sheet conventions the formulas leave to the deal documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationPolicy {
    pub narrow_base: NarrowBase,
    pub day_count: DayCount,
}

/// Reject repeated identifiers within one computation's input set.
pub(crate) fn ensure_unique_ids<'a>(
    ids: impl IntoIterator<Item = &'a SecurityId>,
    what: &str,
) -> EngineResult<()> {
    let mut seen = std::collections::BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(EngineError::validation(format!("duplicate {} id {}", what, id)));
        }
    }
    Ok(())
}

/// Dividend terms must carry non-negative rates and carryovers.
pub(crate) fn validate_dividend(
    id: &SecurityId,
    dividend: &DividendPolicy,
) -> EngineResult<()> {
    if let Some(rate) = dividend.rate() {
        if rate.is_negative() {
            return Err(EngineError::validation(format!(
                "{}: dividend rate must be non-negative, got {}",
                id, rate
            )));
        }
    }
    if let DividendPolicy::Cumulative { unpaid, .. } = dividend {
        if unpaid.is_negative() {
            return Err(EngineError::validation(format!(
                "{}: unpaid dividends must be non-negative, got {}",
                id, unpaid
            )));
        }
    }
    Ok(())
}
