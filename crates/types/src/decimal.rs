//! Deterministic fixed-point decimal used for every reward ratio and balance.
//!
//! Floating-point arithmetic is not reproducible across replicas, so all
//! reward accounting goes through [`Dec`]: a signed value with eighteen
//! fractional digits stored as an arbitrary-precision scaled integer.
//! Products and quotients are computed exactly on the scaled integers and
//! truncated toward zero once, so large token amounts never overflow and no
//! intermediate step loses precision.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use core::str::FromStr;

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::Amount;

/// Number of fractional decimal digits carried by [`Dec`].
pub const PRECISION: u32 = 18;

static SCALE: Lazy<BigInt> = Lazy::new(|| BigInt::from(10u8).pow(PRECISION));

/// Errors produced when parsing a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecimalError {
    #[error("decimal string is empty")]
    Empty,
    #[error("invalid decimal string: {0}")]
    Invalid(String),
    #[error("decimal has {digits} fractional digits, at most {max} are supported")]
    TooPrecise { digits: usize, max: u32 },
}

/// Signed fixed-point decimal with [`PRECISION`] fractional digits.
///
/// Serialises as a canonical string (`"12.500000000000000000"`) so exported
/// state round-trips byte for byte.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dec(BigInt);

impl Dec {
    /// Zero constant.
    pub fn zero() -> Self {
        Self(BigInt::zero())
    }

    /// One constant (represents 1.0).
    pub fn one() -> Self {
        Self(SCALE.clone())
    }

    /// Smallest positive value (1e-18).
    pub fn smallest() -> Self {
        Self(BigInt::one())
    }

    /// Construct from a raw scaled integer.
    pub fn from_raw(raw: BigInt) -> Self {
        Self(raw)
    }

    /// Return the raw scaled integer value.
    pub fn raw(&self) -> &BigInt {
        &self.0
    }

    /// `value * 10^-prec`, e.g. `with_prec(5, 1) == 0.5`.
    pub fn with_prec(value: i64, prec: u32) -> Self {
        let value = BigInt::from(value);
        if prec <= PRECISION {
            Self(value * BigInt::from(10u8).pow(PRECISION - prec))
        } else {
            Self(value / BigInt::from(10u8).pow(prec - PRECISION))
        }
    }

    /// Exact-then-truncated `numerator / denominator`; `None` when the denominator is zero.
    pub fn from_ratio(numerator: Amount, denominator: Amount) -> Option<Self> {
        Self::from(numerator).checked_quo_int(denominator)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    /// Multiplies two decimals, truncating toward zero.
    pub fn mul_truncate(&self, rhs: &Dec) -> Dec {
        Dec((&self.0 * &rhs.0) / &*SCALE)
    }

    /// `self * mul / div` with a single truncation. `None` when `div` is zero.
    pub fn checked_mul_quo(&self, mul: &Dec, div: &Dec) -> Option<Dec> {
        if div.is_zero() {
            return None;
        }
        Some(Dec((&self.0 * &mul.0) / &div.0))
    }

    /// Multiplies by an integer amount; exact.
    pub fn mul_int(&self, rhs: Amount) -> Dec {
        Dec(&self.0 * BigInt::from(rhs))
    }

    /// Divides two decimals, truncating toward zero. `None` on a zero divisor.
    pub fn checked_quo(&self, rhs: &Dec) -> Option<Dec> {
        if rhs.is_zero() {
            return None;
        }
        Some(Dec((&self.0 * &*SCALE) / &rhs.0))
    }

    /// Divides by an integer amount, truncating toward zero. `None` on zero.
    pub fn checked_quo_int(&self, rhs: Amount) -> Option<Dec> {
        if rhs == 0 {
            return None;
        }
        Some(Dec(&self.0 / BigInt::from(rhs)))
    }

    /// Integer part as a decimal, truncated toward zero.
    pub fn truncate(&self) -> Dec {
        Dec((&self.0 / &*SCALE) * &*SCALE)
    }

    /// Splits a non-negative value into its whole-token amount and the
    /// fractional remainder. `None` for negative values or values beyond `u128`.
    pub fn split_amount(&self) -> Option<(Amount, Dec)> {
        if self.is_negative() {
            return None;
        }
        let whole = (&self.0 / &*SCALE).to_u128()?;
        let remainder = Dec(&self.0 % &*SCALE);
        Some((whole, remainder))
    }

    /// Clamps into `[0, 1]`.
    pub fn clamp_unit(&self) -> Dec {
        if self.is_negative() {
            Dec::zero()
        } else if *self > Dec::one() {
            Dec::one()
        } else {
            self.clone()
        }
    }

    /// True when the value lies within `[0, 1]`.
    pub fn is_unit_interval(&self) -> bool {
        !self.is_negative() && *self <= Dec::one()
    }
}

impl From<Amount> for Dec {
    fn from(value: Amount) -> Self {
        Dec(BigInt::from(value) * &*SCALE)
    }
}

impl From<u64> for Dec {
    fn from(value: u64) -> Self {
        Dec::from(value as Amount)
    }
}

impl From<i64> for Dec {
    fn from(value: i64) -> Self {
        Dec(BigInt::from(value) * &*SCALE)
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.abs();
        let whole = &abs / &*SCALE;
        let fractional = (&abs % &*SCALE).to_string();
        let sign = if self.is_negative() { "-" } else { "" };
        write!(f, "{sign}{whole}.{fractional:0>18}")
    }
}

impl FromStr for Dec {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DecimalError::Empty);
        }

        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, fractional) = match body.split_once('.') {
            Some((whole, fractional)) if !fractional.is_empty() => (whole, fractional),
            Some(_) => return Err(DecimalError::Invalid(s.to_string())),
            None => (body, ""),
        };

        let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !digits_only(whole) || !digits_only(fractional) {
            return Err(DecimalError::Invalid(s.to_string()));
        }
        if fractional.len() > PRECISION as usize {
            return Err(DecimalError::TooPrecise {
                digits: fractional.len(),
                max: PRECISION,
            });
        }

        let scaled = format!("{whole}{fractional:0<18}");
        let raw = BigInt::from_str(&scaled).map_err(|_| DecimalError::Invalid(s.to_string()))?;
        Ok(Dec(if negative { -raw } else { raw }))
    }
}

impl From<Dec> for String {
    fn from(value: Dec) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Dec {
    type Error = DecimalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Add for Dec {
    type Output = Dec;

    fn add(self, rhs: Dec) -> Dec {
        Dec(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Dec> for &'a Dec {
    type Output = Dec;

    fn add(self, rhs: &'a Dec) -> Dec {
        Dec(&self.0 + &rhs.0)
    }
}

impl AddAssign for Dec {
    fn add_assign(&mut self, rhs: Dec) {
        self.0 += rhs.0;
    }
}

impl<'a> AddAssign<&'a Dec> for Dec {
    fn add_assign(&mut self, rhs: &'a Dec) {
        self.0 += &rhs.0;
    }
}

impl Sub for Dec {
    type Output = Dec;

    fn sub(self, rhs: Dec) -> Dec {
        Dec(self.0 - rhs.0)
    }
}

impl<'a> Sub<&'a Dec> for &'a Dec {
    type Output = Dec;

    fn sub(self, rhs: &'a Dec) -> Dec {
        Dec(&self.0 - &rhs.0)
    }
}

impl SubAssign for Dec {
    fn sub_assign(&mut self, rhs: Dec) {
        self.0 -= rhs.0;
    }
}

impl<'a> SubAssign<&'a Dec> for Dec {
    fn sub_assign(&mut self, rhs: &'a Dec) {
        self.0 -= &rhs.0;
    }
}

impl Neg for Dec {
    type Output = Dec;

    fn neg(self) -> Dec {
        Dec(-self.0)
    }
}

impl Sum for Dec {
    fn sum<I: Iterator<Item = Dec>>(iter: I) -> Dec {
        iter.fold(Dec::zero(), |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Dec> for Dec {
    fn sum<I: Iterator<Item = &'a Dec>>(iter: I) -> Dec {
        iter.fold(Dec::zero(), |acc, x| &acc + x)
    }
}
