//! `show gpon onu uncfg` parser.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::clean_lines;

static ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*gpon-onu_(\d+/\d+/\d+):(\d+)\s+(\S+)(?:\s+(\S+))?").unwrap()
});

/// An ONU seen on a PON port but not declared in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnconfiguredOnu {
    pub port: String,
    /// Discovery index on the port, not an assigned ONU id.
    pub index: u32,
    pub serial: String,
    pub state: Option<String>,
}

/// Parse the unconfigured-ONU table.
pub fn parse_unconfigured(raw: &str) -> Vec<UnconfiguredOnu> {
    clean_lines(raw)
        .into_iter()
        .filter_map(|line| {
            let caps = ROW.captures(line)?;
            Some(UnconfiguredOnu {
                port: caps[1].to_string(),
                index: caps[2].parse().ok()?,
                serial: caps[3].to_string(),
                state: caps.get(4).map(|m| m.as_str().to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unconfigured() {
        let raw = "\
OnuIndex                 Sn                  State
---------------------------------------------------------------------
gpon-onu_1/2/1:1         ZTEGC8A12345        unknown
gpon-onu_1/2/4:2         HWTC1F2E3D4C
";
        let onus = parse_unconfigured(raw);
        assert_eq!(onus.len(), 2);
        assert_eq!(onus[0].port, "1/2/1");
        assert_eq!(onus[0].index, 1);
        assert_eq!(onus[0].serial, "ZTEGC8A12345");
        assert_eq!(onus[0].state.as_deref(), Some("unknown"));
        assert_eq!(onus[1].serial, "HWTC1F2E3D4C");
        assert!(onus[1].state.is_none());
    }

    #[test]
    fn test_none_pending() {
        assert!(parse_unconfigured("No related information to show.").is_empty());
    }
}
