use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "INR";
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

//--------------------------------------     MinorUnits       ---------------------------------------------------------
/// An amount of money in the smallest currency unit (paise). All ledger arithmetic happens on this type; floating
/// point is only ever produced for display.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct MinorUnits(i64);

op!(binary MinorUnits, Add, add);
op!(binary MinorUnits, Sub, sub);
op!(inplace MinorUnits, AddAssign, add_assign);
op!(inplace MinorUnits, SubAssign, sub_assign);
op!(unary MinorUnits, Neg, neg);

impl Mul<i64> for MinorUnits {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for MinorUnits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Value cannot be represented in minor units: {0}")]
pub struct MinorUnitsParseError(String);

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {CURRENCY_CODE}", self.to_major_string())
    }
}

impl MinorUnits {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(units: i64) -> Self {
        Self(units * MINOR_UNITS_PER_MAJOR)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Renders the amount as a decimal string in major units, e.g. `12345` → `"123.45"`. This is the format payment
    /// gateways expect in request bodies.
    pub fn to_major_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MINOR_UNITS_PER_MAJOR.unsigned_abs();
        format!("{sign}{}.{:02}", abs / per, abs % per)
    }

    /// Parses a decimal major-unit string (`"123.45"`, `"123.4"`, `"123"`) without going through floating point.
    pub fn from_major_str(value: &str) -> Result<Self, MinorUnitsParseError> {
        let value = value.trim();
        let (negative, digits) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (digits, None),
        };
        let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !is_digits(whole) || fraction.is_some_and(|f| !is_digits(f)) {
            return Err(MinorUnitsParseError(value.to_string()));
        }
        let whole = whole.parse::<i64>().map_err(|e| MinorUnitsParseError(format!("{value}. {e}")))?;
        let fraction = match fraction {
            None => 0,
            Some(f) if f.len() == 1 => {
                f.parse::<i64>().map_err(|e| MinorUnitsParseError(format!("{value}. {e}")))? * 10
            },
            Some(f) if f.len() == 2 => f.parse::<i64>().map_err(|e| MinorUnitsParseError(format!("{value}. {e}")))?,
            Some(_) => return Err(MinorUnitsParseError(format!("{value} needs one or two decimal places"))),
        };
        let units = whole
            .checked_mul(MINOR_UNITS_PER_MAJOR)
            .and_then(|w| w.checked_add(fraction))
            .ok_or_else(|| MinorUnitsParseError(format!("{value} is out of range")))?;
        Ok(Self(if negative { -units } else { units }))
    }
}
