//! Share classes and exit events consumed by the liquidation waterfall.

use crate::domain::{Cents, Decimal, DividendPolicy, Participation, SecurityId, SeniorityRank};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

fn default_ratio() -> Decimal {
    Decimal::one()
}

/// A preferred class as it stands at an exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredShareClass {
    pub id: SecurityId,
    pub name: String,
    pub shares: u64,
    pub original_investment: Cents,
    pub liquidation_multiple: Decimal,
    #[serde(default)]
    pub participation: Participation,
    pub seniority_rank: SeniorityRank,
    #[serde(default)]
    pub dividend: DividendPolicy,
    #[serde(default = "default_ratio")]
    pub conversion_ratio: Decimal,
    pub issuance_date: NaiveDate,
}

impl PreferredShareClass {
    /// `original_investment * liquidation_multiple`, excluding dividends.
    pub fn bare_preference(&self) -> Option<Cents> {
        self.original_investment.mul_ratio(self.liquidation_multiple)
    }

    /// Total-take ceiling for a capped participating class.
    pub fn participation_ceiling(&self) -> Option<Option<Cents>> {
        match self.participation.cap() {
            Some(cap) => self.original_investment.mul_ratio(cap).map(Some),
            None => Some(None),
        }
    }

    /// Common-equivalent shares if converted, or `None` on overflow.
    pub fn as_converted_shares(&self) -> Option<Decimal> {
        Decimal::from_u64(self.shares).checked_mul(self.conversion_ratio)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonShareClass {
    pub id: SecurityId,
    pub name: String,
    pub shares: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiquidationEventType {
    #[default]
    Acquisition,
    Merger,
    AssetSale,
    Ipo,
    Dissolution,
}

/// An exit. `exit_value` is the amount available to equity holders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationEvent {
    pub exit_value: Cents,
    pub event_date: NaiveDate,
    #[serde(default)]
    pub event_type: LiquidationEventType,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(participation: Participation) -> PreferredShareClass {
        PreferredShareClass {
            id: SecurityId::new("b"),
            name: "Series B".to_string(),
            shares: 2_000_000,
            original_investment: Cents::from_dollars(10_000_000),
            liquidation_multiple: Decimal::from_str_canonical("1.5").unwrap(),
            participation,
            seniority_rank: SeniorityRank::new(1),
            dividend: DividendPolicy::None,
            conversion_ratio: Decimal::from_u64(2),
            issuance_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        }
    }

    #[test]
    fn test_bare_preference_applies_multiple() {
        let c = class(Participation::NonParticipating);
        assert_eq!(c.bare_preference(), Some(Cents::from_dollars(15_000_000)));
    }

    #[test]
    fn test_participation_ceiling_only_for_capped() {
        let capped = class(Participation::ParticipatingCapped {
            cap: Decimal::from_u64(3),
        });
        assert_eq!(
            capped.participation_ceiling(),
            Some(Some(Cents::from_dollars(30_000_000)))
        );
        assert_eq!(class(Participation::Participating).participation_ceiling(), Some(None));
    }

    #[test]
    fn test_as_converted_shares_uses_ratio() {
        let c = class(Participation::Participating);
        assert_eq!(c.as_converted_shares(), Some(Decimal::from_u64(4_000_000)));

        let mut huge = class(Participation::Participating);
        huge.shares = u64::MAX;
        huge.conversion_ratio = Decimal::from_u64(10_000_000_000);
        assert_eq!(huge.as_converted_shares(), None);
    }

    #[test]
    fn test_event_type_serde() {
        let event: LiquidationEvent = serde_json::from_str(
            r#"{"exitValue": 1000, "eventDate": "2025-06-30", "eventType": "ASSET_SALE"}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, LiquidationEventType::AssetSale);
        assert_eq!(event.exit_value, Cents(1000));
    }
}
