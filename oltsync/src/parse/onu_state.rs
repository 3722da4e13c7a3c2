//! `show gpon onu state` parser and per-port occupancy aggregation.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use super::clean_lines;
use crate::model::PonPortRecord;

static ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:gpon-onu_)?(\d+/\d+/\d+):(\d+)\s+(\S+)\s+(\S+)\s+(\S+)(?:\s+(\S+))?").unwrap()
});

/// One row of the ONU state table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnuStateRow {
    pub port: String,
    pub onu_id: u32,
    pub admin_state: String,
    pub omcc_state: String,
    pub phase_state: String,
    /// Channel column, present on some firmware only.
    pub channel: Option<String>,
}

impl OnuStateRow {
    /// An ONU is online exactly when its phase state is `working`.
    pub fn is_online(&self) -> bool {
        self.phase_state.eq_ignore_ascii_case("working")
    }
}

/// Parse the ONU state table. Header, summary and malformed lines are
/// skipped.
pub fn parse_onu_state(raw: &str) -> Vec<OnuStateRow> {
    clean_lines(raw)
        .into_iter()
        .filter_map(|line| {
            let caps = ROW.captures(line)?;
            Some(OnuStateRow {
                port: caps[1].to_string(),
                onu_id: caps[2].parse().ok()?,
                admin_state: caps[3].to_string(),
                omcc_state: caps[4].to_string(),
                phase_state: caps[5].to_string(),
                channel: caps.get(6).map(|m| m.as_str().to_string()),
            })
        })
        .collect()
}

/// Count registered and online ONUs per PON port, in first-seen order.
pub fn port_occupancy(rows: &[OnuStateRow]) -> Vec<PonPortRecord> {
    let mut ports: IndexMap<&str, (u32, u32)> = IndexMap::new();
    for row in rows {
        let entry = ports.entry(row.port.as_str()).or_default();
        entry.0 += 1;
        if row.is_online() {
            entry.1 += 1;
        }
    }

    ports
        .into_iter()
        .map(|(port, (registered, online))| PonPortRecord {
            port: port.to_string(),
            registered,
            online,
        })
        .collect()
}
