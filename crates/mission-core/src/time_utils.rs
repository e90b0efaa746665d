use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Parse an IANA timezone name, falling back to UTC with a warning.
pub fn resolve_timezone(tz_name: &str) -> Tz {
    tz_name.parse::<Tz>().unwrap_or_else(|_| {
        warn!("unrecognised timezone \"{}\", falling back to UTC", tz_name);
        Tz::UTC
    })
}

// ── 12-hour / 24-hour format detection ───────────────────────────────────────

/// Timezone prefixes for regions that conventionally use a 12-hour clock.
const TWELVE_HOUR_PREFIXES: &[&str] = &[
    "america/",
    "australia/",
    "pacific/auckland",
    "asia/manila",
    "asia/kolkata",
    "asia/calcutta",
    "asia/karachi",
    "asia/dhaka",
    "asia/riyadh",
    "africa/cairo",
    "us/",
    "canada/",
];

/// Decide whether to use 12-hour clock display.
///
/// An explicit `"12h"` / `"24h"` wins; otherwise the region of `timezone`
/// decides. Unknown regions get a 24-hour clock.
pub fn detect_time_format(timezone: &str, explicit: Option<&str>) -> bool {
    if let Some(fmt) = explicit {
        match fmt.to_lowercase().as_str() {
            "12h" => return true,
            "24h" => return false,
            _ => {}
        }
    }

    let lower = timezone.to_lowercase();
    TWELVE_HOUR_PREFIXES.iter().any(|p| lower.starts_with(p))
}

// ── format_entry_time ─────────────────────────────────────────────────────────

/// Format a transcript timestamp as wall-clock time in `tz`, with seconds.
///
/// * `twelve_hour = true`  → `"02:30:05 PM"`
/// * `twelve_hour = false` → `"14:30:05"`
pub fn format_entry_time(dt: &DateTime<Utc>, tz: Tz, twelve_hour: bool) -> String {
    let local = dt.with_timezone(&tz);
    if twelve_hour {
        local.format("%I:%M:%S %p").to_string()
    } else {
        local.format("%H:%M:%S").to_string()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_get_system_timezone_non_empty() {
        assert!(!get_system_timezone().is_empty());
    }

    #[test]
    fn test_resolve_timezone_valid() {
        assert_eq!(resolve_timezone("Europe/Berlin"), Tz::Europe__Berlin);
    }

    #[test]
    fn test_resolve_timezone_invalid_falls_back() {
        assert_eq!(resolve_timezone("Mars/Olympus"), Tz::UTC);
    }

    #[test]
    fn test_detect_time_format_explicit_wins() {
        assert!(detect_time_format("Europe/Berlin", Some("12h")));
        assert!(!detect_time_format("America/New_York", Some("24H")));
    }

    #[test]
    fn test_detect_time_format_by_region() {
        assert!(detect_time_format("America/Chicago", None));
        assert!(detect_time_format("Australia/Sydney", Some("auto")));
        assert!(!detect_time_format("Europe/Paris", None));
        assert!(!detect_time_format("UTC", None));
    }

    #[test]
    fn test_format_entry_time_24h_utc() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 5).unwrap();
        assert_eq!(format_entry_time(&dt, Tz::UTC, false), "14:30:05");
    }

    #[test]
    fn test_format_entry_time_12h_converted() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 19, 0, 0).unwrap();
        // New York is UTC-5 in January.
        assert_eq!(
            format_entry_time(&dt, Tz::America__New_York, true),
            "02:00:00 PM"
        );
    }
}
