//! SAFE notes and the priced rounds they convert into.

use crate::domain::{Cents, Decimal, SecurityId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// SAFE instrument type. Which terms a note carries follows from its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "safeType",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum SafeTerms {
    PreMoneyValuationCap {
        valuation_cap: Cents,
        #[serde(default)]
        discount_rate: Option<Decimal>,
    },
    PostMoneyValuationCap {
        valuation_cap: Cents,
        #[serde(default)]
        discount_rate: Option<Decimal>,
    },
    DiscountOnly {
        discount_rate: Decimal,
    },
}

impl SafeTerms {
    pub fn valuation_cap(&self) -> Option<Cents> {
        match self {
            SafeTerms::PreMoneyValuationCap { valuation_cap, .. }
            | SafeTerms::PostMoneyValuationCap { valuation_cap, .. } => Some(*valuation_cap),
            SafeTerms::DiscountOnly { .. } => None,
        }
    }

    pub fn discount_rate(&self) -> Option<Decimal> {
        match self {
            SafeTerms::PreMoneyValuationCap { discount_rate, .. }
            | SafeTerms::PostMoneyValuationCap { discount_rate, .. } => *discount_rate,
            SafeTerms::DiscountOnly { discount_rate } => Some(*discount_rate),
        }
    }

    /// Same instrument with a different cap. Discount-only terms carry no
    /// cap and are returned unchanged.
    pub fn with_valuation_cap(&self, cap: Cents) -> Self {
        match *self {
            SafeTerms::PreMoneyValuationCap { discount_rate, .. } => {
                SafeTerms::PreMoneyValuationCap {
                    valuation_cap: cap,
                    discount_rate,
                }
            }
            SafeTerms::PostMoneyValuationCap { discount_rate, .. } => {
                SafeTerms::PostMoneyValuationCap {
                    valuation_cap: cap,
                    discount_rate,
                }
            }
            SafeTerms::DiscountOnly { .. } => *self,
        }
    }

    pub fn with_discount_rate(&self, rate: Decimal) -> Self {
        match *self {
            SafeTerms::PreMoneyValuationCap { valuation_cap, .. } => {
                SafeTerms::PreMoneyValuationCap {
                    valuation_cap,
                    discount_rate: Some(rate),
                }
            }
            SafeTerms::PostMoneyValuationCap { valuation_cap, .. } => {
                SafeTerms::PostMoneyValuationCap {
                    valuation_cap,
                    discount_rate: Some(rate),
                }
            }
            SafeTerms::DiscountOnly { .. } => SafeTerms::DiscountOnly {
                discount_rate: rate,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SafeTerms::PreMoneyValuationCap { .. } => "pre-money valuation cap",
            SafeTerms::PostMoneyValuationCap { .. } => "post-money valuation cap",
            SafeTerms::DiscountOnly { .. } => "discount only",
        }
    }
}

/// One term improved under a most-favored-nation clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "term",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum MfnImprovement {
    DiscountRate {
        previous: Option<Decimal>,
        adopted: Decimal,
    },
    ValuationCap {
        previous: Cents,
        adopted: Cents,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MfnAdjustment {
    #[serde(flatten)]
    pub improvement: MfnImprovement,
    pub source_note_id: SecurityId,
    pub source_investor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeNote {
    pub id: SecurityId,
    pub investor_name: String,
    pub investment_amount: Cents,
    #[serde(flatten)]
    pub terms: SafeTerms,
    #[serde(default)]
    pub most_favored_nation: bool,
    #[serde(default)]
    pub pro_rata_rights: bool,
    pub issuance_date: NaiveDate,
    #[serde(default)]
    pub converted: bool,
    #[serde(default)]
    pub mfn_adjustments: Vec<MfnAdjustment>,
}

impl SafeNote {
    pub fn valuation_cap(&self) -> Option<Cents> {
        self.terms.valuation_cap()
    }

    pub fn discount_rate(&self) -> Option<Decimal> {
        self.terms.discount_rate()
    }
}

/// The priced equity round a SAFE converts into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityRound {
    pub name: String,
    pub investment_amount: Cents,
    /// Cents per share.
    pub price_per_share: Cents,
    pub pre_money_valuation: Cents,
    pub share_class: String,
    #[serde(default)]
    pub existing_shares: u64,
    #[serde(default)]
    pub existing_valuation: Cents,
    #[serde(default = "Decimal::one")]
    pub liquidation_preference: Decimal,
    #[serde(default)]
    pub anti_dilution_provision: bool,
    #[serde(default)]
    pub participating_preferred: bool,
}
