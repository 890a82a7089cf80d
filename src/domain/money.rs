//! Integer-cents currency.

use crate::domain::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A currency amount in whole cents.
///
/// Engines never hold currency as a float. Products with fractional
/// multiples (e.g. `1.5x` of an investment) go through [`Cents::mul_ratio`],
/// which rounds half-to-even back to whole cents.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cents(pub i64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub fn new(cents: i64) -> Self {
        Cents(cents)
    }

    /// Whole dollars to cents.
    pub fn from_dollars(dollars: i64) -> Self {
        Cents(dollars * 100)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::from_i64(self.0)
    }

    /// Convert a decimal cents value to whole cents, ties to even.
    pub fn from_decimal_round_half_even(value: Decimal) -> Option<Self> {
        value.round_half_even().to_i64().map(Cents)
    }

    /// Convert a decimal cents value to whole cents, rounding toward
    /// negative infinity.
    pub fn from_decimal_floor(value: Decimal) -> Option<Self> {
        value.floor().to_i64().map(Cents)
    }

    /// `self * ratio`, rounded half-to-even to whole cents.
    pub fn mul_ratio(&self, ratio: Decimal) -> Option<Self> {
        self.to_decimal()
            .checked_mul(ratio)
            .and_then(Self::from_decimal_round_half_even)
    }

    pub fn checked_add(self, rhs: Cents) -> Option<Cents> {
        self.0.checked_add(rhs.0).map(Cents)
    }

    pub fn checked_sub(self, rhs: Cents) -> Option<Cents> {
        self.0.checked_sub(rhs.0).map(Cents)
    }

    /// Subtraction clamped at zero.
    pub fn saturating_sub(self, rhs: Cents) -> Cents {
        Cents((self.0 - rhs.0).max(0))
    }

    pub fn min(self, other: Cents) -> Cents {
        Cents(self.0.min(other.0))
    }

    pub fn max(self, other: Cents) -> Cents {
        Cents(self.0.max(other.0))
    }
}

impl std::ops::Add for Cents {
    type Output = Cents;

    fn add(self, rhs: Cents) -> Cents {
        Cents(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Cents {
    fn add_assign(&mut self, rhs: Cents) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Cents {
    type Output = Cents;

    fn sub(self, rhs: Cents) -> Cents {
        Cents(self.0 - rhs.0)
    }
}

impl std::ops::SubAssign for Cents {
    fn sub_assign(&mut self, rhs: Cents) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Cents {
    fn sum<I: Iterator<Item = Cents>>(iter: I) -> Cents {
        iter.fold(Cents::ZERO, |acc, c| acc + c)
    }
}

/// Renders as `$1,234.56` (or `-$1,234.56`).
impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let dollars = (abs / 100).to_string();
        let cents = abs % 100;

        let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
        for (i, ch) in dollars.chars().enumerate() {
            if i > 0 && (dollars.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        write!(f, "{}${}.{:02}", sign, grouped, cents)
    }
}
