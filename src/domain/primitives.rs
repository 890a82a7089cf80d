//! Domain primitives: SecurityId, SeniorityRank, DayCount.

use crate::domain::Decimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of a security: a preferred series, share class or SAFE note.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityId(pub String);

impl SecurityId {
    pub fn new(id: impl Into<String>) -> Self {
        SecurityId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SecurityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payment priority among preferred classes. Lower is more senior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeniorityRank(pub u32);

impl SeniorityRank {
    pub fn new(rank: u32) -> Self {
        SeniorityRank(rank)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SeniorityRank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Day-count convention for dividend accrual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DayCount {
    /// Actual days / 365.
    #[default]
    #[serde(rename = "actual_365")]
    Actual365,
    /// Actual days / 365.25.
    #[serde(rename = "actual_365_25")]
    Actual36525,
}

impl DayCount {
    fn days_per_year(&self) -> Decimal {
        match self {
            DayCount::Actual365 => Decimal::from_u64(365),
            DayCount::Actual36525 => Decimal::new(rust_decimal::Decimal::new(36525, 2)),
        }
    }

    /// Fractional years from `start` to `end`. Zero when `end` precedes `start`.
    pub fn years_between(&self, start: NaiveDate, end: NaiveDate) -> Decimal {
        let days = (end - start).num_days();
        if days <= 0 {
            return Decimal::zero();
        }
        Decimal::from_i64(days) / self.days_per_year()
    }
}
