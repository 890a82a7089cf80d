//! Preferred series, down-rounds and cap-table snapshots used by the
//! anti-dilution engine.

use crate::domain::{
    AntiDilutionType, Cents, Decimal, DividendPolicy, Participation, SecurityId, SeniorityRank,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

fn default_ratio() -> Decimal {
    Decimal::one()
}

fn default_multiple() -> Decimal {
    Decimal::one()
}

/// A series of preferred stock as issued.
///
/// The conversion ratio is never updated in place: an adjustment produces a
/// new series value via [`PreferredSeries::with_conversion_ratio`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredSeries {
    pub id: SecurityId,
    pub name: String,
    pub shares: u64,
    /// Original issue price in cents per share.
    pub original_price: Cents,
    /// Liquidation preference multiple (typically 1).
    #[serde(default = "default_multiple")]
    pub liquidation_preference: Decimal,
    #[serde(default)]
    pub anti_dilution_type: AntiDilutionType,
    #[serde(default)]
    pub participation: Participation,
    #[serde(default = "default_ratio")]
    pub conversion_ratio: Decimal,
    pub seniority_rank: SeniorityRank,
    #[serde(default)]
    pub dividend: DividendPolicy,
    pub issuance_date: NaiveDate,
}

impl PreferredSeries {
    /// `shares * original_price`, or `None` on overflow.
    pub fn original_investment(&self) -> Option<Cents> {
        i64::try_from(self.shares)
            .ok()
            .and_then(|shares| shares.checked_mul(self.original_price.as_i64()))
            .map(Cents)
    }

    /// Conversion price in effect: `original_price / conversion_ratio`, in
    /// cents per share. Equals the original price until a ratio adjustment.
    pub fn conversion_price(&self) -> Option<Decimal> {
        self.original_price
            .to_decimal()
            .checked_div(self.conversion_ratio)
    }

    /// A copy of this series carrying a new conversion ratio.
    pub fn with_conversion_ratio(&self, conversion_ratio: Decimal) -> Self {
        Self {
            conversion_ratio,
            ..self.clone()
        }
    }
}

/// A financing priced below an earlier round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownRound {
    pub name: String,
    /// New price in cents per share.
    pub new_price: Cents,
    pub shares_issued: u64,
    pub investment_amount: Cents,
}

/// Share counts at the moment of a computation.
///
/// `fully_diluted_shares` is expected to equal the sum of the other fields;
/// the engines read it as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapTableSnapshot {
    pub common_shares: u64,
    pub total_preferred_shares: u64,
    #[serde(default)]
    pub options_outstanding: u64,
    #[serde(default)]
    pub options_available: u64,
    #[serde(default)]
    pub warrants: u64,
    pub fully_diluted_shares: u64,
}

impl CapTableSnapshot {
    /// Sum of the component share counts.
    pub fn components_total(&self) -> u64 {
        self.common_shares
            + self.total_preferred_shares
            + self.options_outstanding
            + self.options_available
            + self.warrants
    }

    pub fn is_consistent(&self) -> bool {
        self.components_total() == self.fully_diluted_shares
    }

    /// Snapshot after `shares` of new preferred were issued.
    pub fn after_preferred_issuance(&self, shares: u64) -> Self {
        Self {
            total_preferred_shares: self.total_preferred_shares.saturating_add(shares),
            fully_diluted_shares: self.fully_diluted_shares.saturating_add(shares),
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> PreferredSeries {
        PreferredSeries {
            id: SecurityId::new("a"),
            name: "Series A".to_string(),
            shares: 1_000_000,
            original_price: Cents(100),
            liquidation_preference: Decimal::one(),
            anti_dilution_type: AntiDilutionType::FullRatchet,
            participation: Participation::NonParticipating,
            conversion_ratio: Decimal::one(),
            seniority_rank: SeniorityRank::new(1),
            dividend: DividendPolicy::None,
            issuance_date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
        }
    }

    #[test]
    fn test_original_investment() {
        assert_eq!(series().original_investment(), Some(Cents::from_dollars(1_000_000)));
    }

    #[test]
    fn test_conversion_price_tracks_ratio() {
        let adjusted = series().with_conversion_ratio(Decimal::from_u64(2));
        assert_eq!(adjusted.conversion_price(), Some(Decimal::from_u64(50)));
        assert_eq!(series().conversion_price(), Some(Decimal::from_u64(100)));
    }

    #[test]
    fn test_with_conversion_ratio_leaves_original_untouched() {
        let original = series();
        let adjusted = original.with_conversion_ratio(Decimal::from_u64(3));
        assert_eq!(original.conversion_ratio, Decimal::one());
        assert_eq!(adjusted.conversion_ratio, Decimal::from_u64(3));
    }

    #[test]
    fn test_snapshot_consistency() {
        let snapshot = CapTableSnapshot {
            common_shares: 8_000_000,
            total_preferred_shares: 2_000_000,
            options_outstanding: 500_000,
            options_available: 400_000,
            warrants: 100_000,
            fully_diluted_shares: 11_000_000,
        };
        assert!(snapshot.is_consistent());
        let grown = snapshot.after_preferred_issuance(1_000_000);
        assert_eq!(grown.total_preferred_shares, 3_000_000);
        assert_eq!(grown.fully_diluted_shares, 12_000_000);
        assert!(grown.is_consistent());
    }

    #[test]
    fn test_series_deserializes_with_defaults() {
        let json = r#"{
            "id": "seed",
            "name": "Seed",
            "shares": 500000,
            "originalPrice": 80,
            "seniorityRank": 2,
            "issuanceDate": "2021-03-01"
        }"#;
        let parsed: PreferredSeries = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.conversion_ratio, Decimal::one());
        assert_eq!(parsed.anti_dilution_type, AntiDilutionType::None);
        assert_eq!(parsed.participation, Participation::NonParticipating);
    }
}
