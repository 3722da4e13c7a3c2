//! Unit normalization for values reported with free-form suffixes.

use std::sync::LazyLock;

use regex::Regex;

use super::UNKNOWN;

static MEMORY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*([kmgt]?)(?:i?b(?:ytes?)?)?\s*$").unwrap());

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)").unwrap());

static UPTIME_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(days?|d|hours?|hrs?|h|minutes?|mins?|m|seconds?|secs?|s)\b").unwrap()
});

/// Memory size normalized to kilobytes. `512MB`, `1.5 GB`, `2048KB` and
/// bare numbers (taken as KB) are accepted; anything else is `0`.
pub fn memory_kb(value: &str) -> u64 {
    let Some(caps) = MEMORY.captures(value) else {
        return 0;
    };
    let Ok(amount) = caps[1].parse::<f64>() else {
        return 0;
    };
    let factor = match caps[2].to_ascii_lowercase().as_str() {
        "m" => 1024.0,
        "g" => 1024.0 * 1024.0,
        "t" => 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    };
    (amount * factor).round() as u64
}

/// First number in `value` as a rounded percentage, `0` when absent.
pub fn percent(value: &str) -> u32 {
    NUMBER
        .captures(value)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(|v| v.round() as u32)
        .unwrap_or(0)
}

/// First number in `value`, `NaN` when absent.
pub fn number_or_nan(value: &str) -> f64 {
    NUMBER
        .captures(value)
        .and_then(|c| c[1].parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// Compact an uptime such as `10 days, 5 hours, 30 minutes` to `10d 5h`.
///
/// Keeps the two most significant non-zero units among days, hours and
/// minutes. Unparseable text becomes `-`.
pub fn compact_uptime(value: &str) -> String {
    let (mut days, mut hours, mut minutes) = (0u64, 0u64, 0u64);
    let mut matched = false;

    for caps in UPTIME_PART.captures_iter(value) {
        let Ok(n) = caps[1].parse::<u64>() else {
            continue;
        };
        matched = true;
        match caps[2].to_ascii_lowercase().chars().next() {
            Some('d') => days += n,
            Some('h') => hours += n,
            Some('m') => minutes += n,
            _ => {}
        }
    }

    if !matched {
        return UNKNOWN.to_string();
    }
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
