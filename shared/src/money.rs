//! Money type
//!
//! All monetary amounts flow through [`Money`], a thin wrapper over
//! [`rust_decimal::Decimal`]. The rounding policy is fixed at two decimal
//! places, midpoint away from zero, applied by [`Money::rounded`] at every
//! point where an amount is computed rather than copied.
//!
//! In SQLite, money columns are TEXT holding the canonical decimal string
//! (e.g. `"19.99"`), matching the wire representation.

use std::borrow::Cow;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{Sqlite, SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};

/// Two-decimal monetary amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Money(pub Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build from an integer amount of cents
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Whole cents, as sent to the payment provider
    pub fn to_cents(&self) -> i64 {
        (self.rounded().0 * Decimal::from(100))
            .trunc()
            .try_into()
            .unwrap_or(i64::MAX)
    }

    /// Apply the fixed rounding policy (2dp, midpoint away from zero)
    pub fn rounded(&self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Clamp negative results to zero (refund floor)
    pub fn floor_at_zero(self) -> Self {
        if self.is_negative() { Money::ZERO } else { self }
    }

    /// Multiply by an item quantity
    pub fn times(&self, quantity: i64) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Decimal::from_str(s)?))
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Money {
    type Output = Money;
    fn mul(self, rhs: Decimal) -> Money {
        Money(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

// ========== SQLite codec (TEXT) ==========

impl sqlx::Type<Sqlite> for Money {
    fn type_info() -> SqliteTypeInfo {
        <String as sqlx::Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <String as sqlx::Type<Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, Sqlite> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<SqliteArgumentValue<'q>>,
    ) -> Result<IsNull, BoxDynError> {
        buf.push(SqliteArgumentValue::Text(Cow::Owned(self.0.to_string())));
        Ok(IsNull::No)
    }
}

impl<'r> sqlx::Decode<'r, Sqlite> for Money {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        let text = <&str as sqlx::Decode<Sqlite>>::decode(value)?;
        Ok(Money(Decimal::from_str(text)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    #[test]
    fn rounds_to_two_decimals_midpoint_away_from_zero() {
        assert_eq!(m("10.005").rounded(), m("10.01"));
        assert_eq!(m("10.004").rounded(), m("10.00"));
    }

    #[test]
    fn sums_and_multiplies_exactly() {
        let total: Money = [m("10").times(2), m("20").times(1)].into_iter().sum();
        assert_eq!(total, m("40"));
    }

    #[test]
    fn cents_round_trip() {
        assert_eq!(Money::from_cents(1999).to_cents(), 1999);
        assert_eq!(m("12.5").to_cents(), 1250);
    }

    #[test]
    fn floors_negative_amounts_at_zero() {
        let refund = m("5") - m("10");
        assert_eq!(refund.floor_at_zero(), Money::ZERO);
    }
}
