use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// Signed, currency-agnostic amount with two decimal places of precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::from(cents) / Decimal::from(100))
    }

    /// Rounds to the smallest currency unit. Saturates on overflow.
    pub fn to_cents(self) -> i64 {
        let saturated = if self.0.is_sign_negative() { i64::MIN } else { i64::MAX };
        self.0
            .checked_mul(Decimal::from(100))
            .and_then(|cents| cents.round().to_i64())
            .unwrap_or(saturated)
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(2))
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    /// True when the absolute difference is at most `tolerance`.
    pub fn approx_eq(self, other: Money, tolerance: Decimal) -> bool {
        self.0
            .checked_sub(other.0)
            .is_some_and(|diff| diff.abs() <= tolerance)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(decimal: Decimal) -> Self {
        Money::from_decimal(decimal)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |a, b| a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn cents_round_trip_through_decimal() {
        assert_eq!(Money::from_cents(-1234).to_cents(), -1234);
        assert_eq!(Money::from_decimal(dec("12.345")).to_cents(), 1234);
        assert_eq!(Money::from_decimal(dec("12.355")).to_cents(), 1236);
    }

    #[test]
    fn display_is_currency_agnostic() {
        assert_eq!(Money::from_cents(550).to_string(), "5.50");
        assert_eq!(Money::from_cents(-7).to_string(), "-0.07");
    }

    #[test]
    fn to_cents_saturates_instead_of_overflowing() {
        assert_eq!(Money::from_decimal(Decimal::MAX).to_cents(), i64::MAX);
        assert_eq!(Money::from_decimal(Decimal::MIN).to_cents(), i64::MIN);
        assert_eq!(Money::from_decimal(dec("50000000000000000000000000")).to_cents(), i64::MAX);
    }

    #[test]
    fn approx_eq_includes_tolerance() {
        let a = Money::from_decimal(dec("10.00"));
        assert!(a.approx_eq(Money::from_decimal(dec("10.00")), dec("0.01")));
        assert!(a.approx_eq(Money::from_decimal(dec("10.01")), dec("0.01")));
        assert!(a.approx_eq(Money::from_decimal(dec("9.99")), dec("0.01")));
        assert!(!a.approx_eq(Money::from_decimal(dec("10.02")), dec("0.01")));
    }

    #[test]
    fn approx_eq_of_extreme_amounts_does_not_panic() {
        let max = Money::from_decimal(Decimal::MAX);
        let min = Money::from_decimal(Decimal::MIN);
        assert!(!max.approx_eq(min, dec("0.01")));
    }

    #[test]
    fn sum_of_amounts() {
        let total: Money = [150, -50, 25].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.to_cents(), 125);
    }
}
