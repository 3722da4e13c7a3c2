//! Interface port-status and counter parsers.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::clean_lines;

/// Marker that distinguishes real interface counters from a rejection.
pub const RATE_MARKER: &str = "Input rate";

static PORT_STATUS_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([a-z][\w-]*_\d+/\d+/\d+)\s+.*?\b(up|down)\b").unwrap()
});

static INPUT_RATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)input\s+rate\s*:\s*(\d+(?:\.\d+)?)\s*(?:([kmg]?)(b)ps)?").unwrap()
});

static OUTPUT_RATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)output\s+rate\s*:\s*(\d+(?:\.\d+)?)\s*(?:([kmg]?)(b)ps)?").unwrap()
});

/// Link state as reported by port-status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Up,
    Down,
}

/// One row of `show interface port-status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortStatusRow {
    pub interface: String,
    pub state: LinkState,
}

/// Parse port-status rows: an interface name of the form
/// `<prefix>_<a>/<b>/<c>` followed somewhere by `up` or `down`.
pub fn parse_port_status(raw: &str) -> Vec<PortStatusRow> {
    clean_lines(raw)
        .into_iter()
        .filter_map(|line| {
            let caps = PORT_STATUS_ROW.captures(line)?;
            let state = if caps[2].eq_ignore_ascii_case("up") {
                LinkState::Up
            } else {
                LinkState::Down
            };
            Some(PortStatusRow {
                interface: caps[1].to_string(),
                state,
            })
        })
        .collect()
}

/// Receive/transmit throughput in Mbps.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct InterfaceRates {
    pub rx_mbps: f64,
    pub tx_mbps: f64,
}

/// Whether `raw` looks like interface counters.
pub fn has_rate_marker(raw: &str) -> bool {
    raw.contains(RATE_MARKER)
}

fn rate_mbps(re: &Regex, raw: &str) -> f64 {
    let Some(caps) = re.captures(raw) else {
        return 0.0;
    };
    let Ok(value) = caps[1].parse::<f64>() else {
        return 0.0;
    };

    let value = if caps.get(3).is_some_and(|m| m.as_str() == "B") {
        value * 8.0
    } else {
        value
    };
    match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
        Some("g") => value * 1000.0,
        Some("k") => value / 1000.0,
        Some("") => value / 1_000_000.0,
        // Unitless or Mbps
        _ => value,
    }
}

/// Parse input/output rates, normalized to Mbps. Absent rates are `0`.
pub fn parse_interface_rates(raw: &str) -> InterfaceRates {
    InterfaceRates {
        rx_mbps: rate_mbps(&INPUT_RATE, raw),
        tx_mbps: rate_mbps(&OUTPUT_RATE, raw),
    }
}
