//! Fixed two-decimal money type.
//!
//! Amounts are held as an integer count of minor units (cents) so that split
//! arithmetic is exact. `bigdecimal` is only used at the edges: parsing user
//! input and rendering percentages.

use bigdecimal::{BigDecimal, ToPrimitive};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// A monetary amount with exactly two decimal places.
///
/// ```
/// use split_ledger::Money;
///
/// let amount: Money = "10.5".parse().unwrap();
/// assert_eq!(amount.minor_units(), 1050);
/// assert_eq!(amount.to_string(), "10.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    /// Number of decimal places kept.
    pub const SCALE: i64 = 2;

    /// Minor units per major unit.
    pub const MINOR_PER_MAJOR: i64 = 100;

    /// Zero value.
    pub const ZERO: Self = Money(0);

    /// Creates an amount from a count of cents.
    pub const fn from_minor_units(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the amount as a count of cents.
    pub const fn minor_units(&self) -> i64 {
        self.0
    }

    /// Converts a decimal into money, rejecting anything finer than a cent.
    pub fn from_decimal(value: &BigDecimal) -> Result<Self, MoneyError> {
        check_decimal_bounds(value)?;
        let scaled = value * BigDecimal::from(Self::MINOR_PER_MAJOR);
        let whole = scaled.with_scale(0);
        if whole != scaled {
            return Err(MoneyError::TooPrecise(value.to_string()));
        }
        whole
            .to_i64()
            .map(Money)
            .ok_or_else(|| MoneyError::OutOfRange(value.to_string()))
    }

    /// Returns the amount as a decimal with scale 2.
    pub fn to_decimal(&self) -> BigDecimal {
        BigDecimal::new(self.0.into(), Self::SCALE)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Addition that reports overflow instead of wrapping or panicking
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    pub fn saturating_add(self, rhs: Self) -> Self {
        Money(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        Money(self.0.saturating_sub(rhs.0))
    }

    /// Sum of `amounts`, or `None` if an intermediate total leaves the `i64` range
    pub fn checked_sum<'a, I>(amounts: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |total, amount| total.checked_add(*amount))
    }
}

/// Most significant digits accepted in a decimal input
pub const MAX_DECIMAL_DIGITS: u64 = 30;

/// Largest exponent magnitude accepted in a decimal input
///
/// `1e-16` and `1e16` pass; `1e-2000000` does not.
pub const MAX_DECIMAL_EXPONENT: i64 = 16;

/// Rejects decimals whose digit count or exponent would make arithmetic
/// on them expensive.
pub fn check_decimal_bounds(value: &BigDecimal) -> Result<(), MoneyError> {
    let digits = value.digits();
    if digits > MAX_DECIMAL_DIGITS {
        return Err(MoneyError::Unbounded(format!("{} digits", digits)));
    }
    let (_, scale) = value.as_bigint_and_exponent();
    if scale.abs() > MAX_DECIMAL_EXPONENT {
        return Err(MoneyError::Unbounded(format!("exponent {}", -scale)));
    }
    Ok(())
}

/// Errors raised when turning user input into [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Amount has more than two decimal places: {0}")]
    TooPrecise(String),
    #[error("Amount out of range: {0}")]
    OutOfRange(String),
    #[error("Invalid amount: {0}")]
    Parse(String),
    #[error("Number is too long or too finely scaled: {0}")]
    Unbounded(String),
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal =
            BigDecimal::from_str(s.trim()).map_err(|_| MoneyError::Parse(s.to_string()))?;
        Money::from_decimal(&decimal)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = Self::MINOR_PER_MAJOR as u64;
        write!(f, "{}{}.{:02}", sign, abs / per, abs % per)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let decimal = deserializer.deserialize_any(FlexibleDecimalVisitor)?;
        Money::from_decimal(&decimal).map_err(de::Error::custom)
    }
}

/// Accepts both JSON numbers and numeric strings.
///
/// Floats go through their shortest textual form so that `10.01` stays
/// `10.01` instead of picking up binary noise.
struct FlexibleDecimalVisitor;

impl<'de> Visitor<'de> for FlexibleDecimalVisitor {
    type Value = BigDecimal;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a decimal number or numeric string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let decimal = BigDecimal::from_str(v.trim())
            .map_err(|_| E::custom(format!("invalid decimal: {}", v)))?;
        check_decimal_bounds(&decimal).map_err(E::custom)?;
        Ok(decimal)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(BigDecimal::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(BigDecimal::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if !v.is_finite() {
            return Err(E::custom("decimal must be finite"));
        }
        self.visit_str(&v.to_string())
    }
}

struct FlexibleDecimal(BigDecimal);

impl<'de> Deserialize<'de> for FlexibleDecimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer
            .deserialize_any(FlexibleDecimalVisitor)
            .map(FlexibleDecimal)
    }
}

/// `deserialize_with` helper for a decimal field given as number or string.
pub fn deserialize_decimal<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    FlexibleDecimal::deserialize(deserializer).map(|d| d.0)
}

/// `deserialize_with` helper for an optional map of decimals keyed by member id.
pub fn deserialize_decimal_map<'de, D>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, BigDecimal>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, FlexibleDecimal>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|map| map.into_iter().map(|(k, v)| (k, v.0)).collect()))
}
