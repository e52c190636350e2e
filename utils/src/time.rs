//! Time formatting helpers.

use prism_types::Timestamp;

/// Format a duration in seconds to a human-readable string.
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// How long until `until`, e.g. `"in 2m 0s"`, or `"now"` if it has passed.
pub fn format_until(until: Timestamp, now: Timestamp) -> String {
    match until.as_secs().checked_sub(now.as_secs()) {
        Some(secs) if secs > 0 => format!("in {}", format_duration(secs)),
        _ => "now".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(120), "2m 0s");
        assert_eq!(format_duration(3_660), "1h 1m");
        assert_eq!(format_duration(86_400), "1d 0h");
    }

    #[test]
    fn until() {
        let now = Timestamp::new(1_000);
        assert_eq!(format_until(Timestamp::new(1_120), now), "in 2m 0s");
        assert_eq!(format_until(Timestamp::new(900), now), "now");
        assert_eq!(format_until(now, now), "now");
    }
}
