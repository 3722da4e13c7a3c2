//! Alarm log parser.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::clean_lines;

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:\d+\s+)?\[?(\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2})\]?\s+\[?(critical|major|minor|warning|notice|informational|info|cleared)\]?\s*[:\-]?\s*(\S.*)$",
    )
    .unwrap()
});

/// One alarm log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlarmEntry {
    pub timestamp: String,
    /// Lowercased severity.
    pub severity: String,
    pub message: String,
}

/// Parse the alarm log, newest first. The device prints oldest first;
/// lines that are not `timestamp severity message` are dropped.
pub fn parse_alarms(raw: &str) -> Vec<AlarmEntry> {
    let mut entries: Vec<AlarmEntry> = clean_lines(raw)
        .into_iter()
        .filter_map(|line| {
            let caps = ENTRY.captures(line)?;
            Some(AlarmEntry {
                timestamp: caps[1].to_string(),
                severity: caps[2].to_ascii_lowercase(),
                message: caps[3].trim().to_string(),
            })
        })
        .collect();
    entries.reverse();
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alarms_newest_first() {
        let raw = "\
Alarm log
2024-03-01 08:00:01  major     gpon-onu_1/2/1:3 LOS
  continuation line without timestamp
2024-03-01 09:15:44  Critical  card 1/1/5 offline
[2024-03-01 10:00:00] [warning] fan speed high
";
        let alarms = parse_alarms(raw);
        assert_eq!(alarms.len(), 3);
        assert_eq!(alarms[0].timestamp, "2024-03-01 10:00:00");
        assert_eq!(alarms[0].severity, "warning");
        assert_eq!(alarms[0].message, "fan speed high");
        assert_eq!(alarms[1].severity, "critical");
        assert_eq!(alarms[1].message, "card 1/1/5 offline");
        assert_eq!(alarms[2].message, "gpon-onu_1/2/1:3 LOS");
    }

    #[test]
    fn test_indexed_rows() {
        let alarms = parse_alarms("12  2024-03-01 08:00:01  minor  power supply 2 degraded");
        assert_eq!(alarms[0].severity, "minor");
        assert_eq!(alarms[0].message, "power supply 2 degraded");
    }

    #[test]
    fn test_garbage_is_empty() {
        assert!(parse_alarms("%Error 20203: Unknown command.").is_empty());
    }
}
