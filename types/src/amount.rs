//! Millisatoshi amounts.
//!
//! Every invoice, obligation and fee in Prism is denominated in millisatoshis.
//! Most Lightning nodes only settle whole satoshis, so the helpers here also
//! round to the nearest satoshi.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use crate::TypeError;

/// Millisatoshis per satoshi.
pub const MSATS_PER_SAT: u64 = 1_000;

/// An amount in millisatoshis.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MilliSats(u64);

impl MilliSats {
    pub const ZERO: Self = Self(0);

    pub const fn new(msats: u64) -> Self {
        Self(msats)
    }

    pub const fn from_sats(sats: u64) -> Self {
        Self(sats.saturating_mul(MSATS_PER_SAT))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whole satoshis, rounded half-up.
    pub fn to_sats(&self) -> u64 {
        self.0.saturating_add(MSATS_PER_SAT / 2) / MSATS_PER_SAT
    }

    /// The same amount rounded to the nearest whole satoshi.
    pub fn round_to_sats(&self) -> Self {
        Self(self.to_sats() * MSATS_PER_SAT)
    }

    /// The same amount rounded down to a whole satoshi.
    pub fn floor_to_sats(&self) -> Self {
        Self(self.0 / MSATS_PER_SAT * MSATS_PER_SAT)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// `fraction` of this amount, rounded to the nearest millisatoshi.
    ///
    /// Fractions outside `0.0..=1.0` are clamped.
    pub fn portion(&self, fraction: f64) -> Self {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self((self.0 as f64 * fraction).round() as u64)
    }
}

impl Add for MilliSats {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for MilliSats {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for MilliSats {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sum for MilliSats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, v| acc + v)
    }
}

impl FromStr for MilliSats {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| TypeError::InvalidAmount(s.to_string()))
    }
}

impl fmt::Display for MilliSats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} msat", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sats_round_half_up() {
        assert_eq!(MilliSats::new(1_499).to_sats(), 1);
        assert_eq!(MilliSats::new(1_500).to_sats(), 2);
        assert_eq!(MilliSats::new(1_500).round_to_sats(), MilliSats::new(2_000));
        assert_eq!(MilliSats::new(1_999).floor_to_sats(), MilliSats::new(1_000));
    }

    #[test]
    fn portion_rounds_and_clamps() {
        let amount = MilliSats::new(1_000_000);
        assert_eq!(amount.portion(0.25), MilliSats::new(250_000));
        assert_eq!(amount.portion(1.5), amount);
        assert_eq!(amount.portion(-0.1), MilliSats::ZERO);
        assert_eq!(amount.portion(f64::NAN), MilliSats::ZERO);
        assert_eq!(MilliSats::new(3).portion(1.0 / 3.0), MilliSats::new(1));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!("2500".parse::<MilliSats>().unwrap(), MilliSats::new(2_500));
        assert!(matches!(
            "abc".parse::<MilliSats>(),
            Err(TypeError::InvalidAmount(_))
        ));
        assert!("-5".parse::<MilliSats>().is_err());
    }

    #[test]
    fn sum_of_amounts() {
        let total: MilliSats = [1, 2, 3].into_iter().map(MilliSats::new).sum();
        assert_eq!(total, MilliSats::new(6));
    }
}
