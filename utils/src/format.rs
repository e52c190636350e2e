//! Human-readable amounts and shares, as shown in logs and LNURL/profile text.

use prism_types::MilliSats;

/// `1234500` msat → `"1,235 sats"` (rounded to the nearest sat).
pub fn format_sats(amount: MilliSats) -> String {
    let sats = amount.to_sats().to_string();
    let mut grouped = String::with_capacity(sats.len() + sats.len() / 3);
    for (i, c) in sats.chars().enumerate() {
        if i > 0 && (sats.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let unit = if amount.to_sats() == 1 { "sat" } else { "sats" };
    format!("{grouped} {unit}")
}

/// A fraction in `0.0..=1.0` as a percentage with two decimals.
pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}
