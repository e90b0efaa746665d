use chrono_tz::Tz;

use crate::models::{LogEntry, TokenUsage};
use crate::time_utils::format_entry_time;

/// Render `value` with `decimals` fractional digits and comma-grouped
/// thousands.
///
/// ```
/// use mission_core::formatting::format_number;
///
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (whole, fraction) = match fixed.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + whole.len() / 3 + 1);
    // No "-0.00".
    if value < 0.0 && fixed.bytes().any(|b| matches!(b, b'1'..=b'9')) {
        out.push('-');
    }
    out.push_str(&group_thousands(whole));
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

/// Format a token count with thousands separators.
///
/// ```
/// use mission_core::formatting::format_tokens;
///
/// assert_eq!(format_tokens(1_234_567), "1,234,567");
/// ```
pub fn format_tokens(count: u64) -> String {
    group_thousands(&count.to_string())
}

/// Format a mission cost in USD.
///
/// Mission costs are often fractions of a cent, so four decimals are shown.
///
/// ```
/// use mission_core::formatting::format_cost;
///
/// assert_eq!(format_cost(0.0021), "$0.0021");
/// assert_eq!(format_cost(1234.5), "$1,234.5000");
/// ```
pub fn format_cost(amount: f64) -> String {
    format!("${}", format_number(amount, 4))
}

/// One-line usage summary, e.g. `"120 in / 340 out tokens, $0.0021"`.
pub fn format_usage(usage: &TokenUsage) -> String {
    format!(
        "{} in / {} out tokens, {}",
        format_tokens(usage.input_tokens),
        format_tokens(usage.output_tokens),
        format_cost(usage.total_cost)
    )
}

/// Header of a transcript line: `"[14:30:05] Alice THOUGHT: "`.
pub fn format_entry_prefix(entry: &LogEntry, tz: Tz, twelve_hour: bool) -> String {
    format!(
        "[{}] {} {}: ",
        format_entry_time(&entry.timestamp, tz, twelve_hour),
        entry.agent_label,
        entry.kind
    )
}

/// Full transcript line for `entry`.
pub fn format_entry(entry: &LogEntry, tz: Tz, twelve_hour: bool) -> String {
    format!(
        "{}{}",
        format_entry_prefix(entry, tz, twelve_hour),
        entry.payload.to_display_string()
    )
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// `"1234567"` -> `"1,234,567"`.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.char_indices() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
