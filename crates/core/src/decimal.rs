//! Exact decimal value object.
//!
//! Monetary and weight columns are exact-decimal: `20` and `20.00` are equal,
//! and comparisons never go through floating point. Values are stored as an
//! integer mantissa plus a decimal scale, normalized so that structural
//! equality is value equality.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DomainError;

/// Maximum fraction digits accepted when parsing.
const MAX_SCALE: u32 = 9;

/// Maximum significant digits accepted when parsing.
///
/// Keeps scale-aligned comparison well inside i128 range.
const MAX_DIGITS: u32 = 18;

/// An exact decimal number (`mantissa * 10^-scale`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

impl Decimal {
    /// Build from a raw mantissa/scale pair, normalizing trailing zeros.
    pub fn new(mantissa: i128, scale: u32) -> Self {
        let mut d = Self { mantissa, scale };
        d.normalize();
        d
    }

    pub fn from_i64(value: i64) -> Self {
        Self::new(i128::from(value), 0)
    }

    /// Build from an amount expressed in minor units (e.g. cents with scale 2).
    pub fn from_minor_units(amount: i64, scale: u32) -> Self {
        Self::new(i128::from(amount), scale)
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    fn normalize(&mut self) {
        while self.scale > 0 && self.mantissa % 10 == 0 {
            self.mantissa /= 10;
            self.scale -= 1;
        }
        if self.mantissa == 0 {
            self.scale = 0;
        }
    }

    fn aligned(&self, other: &Self) -> (i128, i128) {
        // Scales are bounded by MAX_SCALE and mantissas by MAX_DIGITS digits,
        // so the widening multiply cannot overflow i128.
        let scale = self.scale.max(other.scale);
        let a = self.mantissa * 10i128.pow(scale - self.scale);
        let b = other.mantissa * 10i128.pow(scale - other.scale);
        (a, b)
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = self.aligned(other);
        a.cmp(&b)
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Decimal {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(DomainError::validation(format!("not a decimal: {s:?}")));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(DomainError::validation(format!("not a decimal: {s:?}")));
        }

        let scale = u32::try_from(frac_part.len())
            .ok()
            .filter(|&n| n <= MAX_SCALE)
            .ok_or_else(|| DomainError::validation(format!("too many fraction digits: {s:?}")))?;

        let significant = int_part.len() + frac_part.len();
        if significant as u32 > MAX_DIGITS {
            return Err(DomainError::validation(format!("too many digits: {s:?}")));
        }

        let mut mantissa: i128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            mantissa = mantissa * 10 + i128::from(b - b'0');
        }
        if negative {
            mantissa = -mantissa;
        }

        Ok(Self::new(mantissa, scale))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let abs = self.mantissa.unsigned_abs();
        let pow = 10u128.pow(self.scale);
        let int = abs / pow;
        let frac = abs % pow;
        write!(f, "{sign}{int}.{frac:0width$}", width = self.scale as usize)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
