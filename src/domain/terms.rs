//! Contract terms shared by preferred series and waterfall share classes.

use crate::domain::{Cents, DayCount, Decimal};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Anti-dilution formula attached to a preferred series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AntiDilutionType {
    FullRatchet,
    WeightedAverageBroad,
    WeightedAverageNarrow,
    #[default]
    None,
}

impl std::fmt::Display for AntiDilutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AntiDilutionType::FullRatchet => write!(f, "full ratchet"),
            AntiDilutionType::WeightedAverageBroad => write!(f, "broad-based weighted average"),
            AntiDilutionType::WeightedAverageNarrow => write!(f, "narrow-based weighted average"),
            AntiDilutionType::None => write!(f, "none"),
        }
    }
}

/// How a preferred class shares in proceeds beyond its preference.
///
/// A capped class always carries its cap multiple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Participation {
    #[default]
    NonParticipating,
    Participating,
    ParticipatingCapped {
        /// Multiple of original investment bounding the class's total take.
        cap: Decimal,
    },
}

impl Participation {
    pub fn participates(&self) -> bool {
        !matches!(self, Participation::NonParticipating)
    }

    pub fn cap(&self) -> Option<Decimal> {
        match self {
            Participation::ParticipatingCapped { cap } => Some(*cap),
            _ => None,
        }
    }
}

/// Dividend entitlement of a preferred class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum DividendPolicy {
    #[default]
    None,
    Cumulative {
        /// Annual simple rate in percent.
        rate: Decimal,
        /// Carried-over dividends from prior periods.
        #[serde(default)]
        unpaid: Cents,
    },
    NonCumulative {
        rate: Decimal,
    },
}

impl DividendPolicy {
    pub fn rate(&self) -> Option<Decimal> {
        match self {
            DividendPolicy::None => None,
            DividendPolicy::Cumulative { rate, .. } | DividendPolicy::NonCumulative { rate } => {
                Some(*rate)
            }
        }
    }

    /// Dividends accrued on `investment` from `issued` to `as_of`.
    ///
    /// Only cumulative dividends accrue; the result includes the unpaid
    /// carryover. Returns `None` on overflow.
    pub fn accrued(
        &self,
        investment: Cents,
        issued: NaiveDate,
        as_of: NaiveDate,
        day_count: DayCount,
    ) -> Option<Cents> {
        match self {
            DividendPolicy::Cumulative { rate, unpaid } => {
                let years = day_count.years_between(issued, as_of);
                let accrued = investment.mul_ratio(rate.percent_to_fraction().checked_mul(years)?)?;
                accrued.checked_add(*unpaid)
            }
            DividendPolicy::None | DividendPolicy::NonCumulative { .. } => Some(Cents::ZERO),
        }
    }
}
