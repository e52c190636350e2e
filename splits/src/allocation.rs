//! Percentage allocation.
//!
//! Fixed shares are denominated directly in percent of the whole and are
//! served first, in target order; a fixed share that no longer fits in what
//! remains gets nothing. The remainder is split between floating shares in
//! proportion to their weights.

use prism_types::MilliSats;

/// Slack for comparing fixed percentages that sum to exactly 100.
const EPSILON: f64 = 1e-9;

/// One target's claim on incoming value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Share {
    pub weight: u32,
    pub fixed: bool,
}

/// Fraction of the whole owed to each share, in input order.
pub fn percentages(shares: &[Share]) -> Vec<f64> {
    let mut out = vec![0.0; shares.len()];
    let mut available = 1.0_f64;

    for (slot, share) in out.iter_mut().zip(shares).filter(|(_, s)| s.fixed) {
        let wanted = f64::from(share.weight) / 100.0;
        if wanted <= available + EPSILON {
            *slot = wanted;
            available = (available - wanted).max(0.0);
        }
    }

    let floating: u64 = shares
        .iter()
        .filter(|s| !s.fixed)
        .map(|s| u64::from(s.weight))
        .sum();
    if floating > 0 {
        for (slot, share) in out.iter_mut().zip(shares).filter(|(_, s)| !s.fixed) {
            *slot = available * share.weight as f64 / floating as f64;
        }
    }
    out
}

/// Split `amount` by `fractions`, rounding each part to the nearest msat.
pub fn allocate(amount: MilliSats, fractions: &[f64]) -> Vec<MilliSats> {
    fractions.iter().map(|f| amount.portion(*f)).collect()
}
