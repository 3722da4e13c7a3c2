//! Card inventory, card detail and card temperature parsers.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::units::{compact_uptime, memory_kb, percent};
use super::{UNKNOWN, clean_lines, key_value_pairs, normalize_key, text_or_unknown};

/// `rack shelf slot cfg-type [real-type port hard-ver soft-ver] status`
static INVENTORY_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s+(\d+)\s+(\d+)\s+(\S+)(.*)$").unwrap());

static TEMPERATURE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s+(\d+)\s+(\d+)\s+(-?\d+(?:\.\d+)?)").unwrap());

/// One row of the card inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardRow {
    pub rack: u32,
    pub shelf: u32,
    pub slot: u32,
    pub cfg_type: String,
    pub real_type: String,
    pub ports: u32,
    pub hard_ver: String,
    pub soft_ver: String,
    pub status: String,
}

impl CardRow {
    /// Offline and mismatched cards are skipped for detail queries.
    pub fn is_offline(&self) -> bool {
        let status = self.status.to_ascii_uppercase();
        status == "OFFLINE" || status.contains("TYPEERROR") || status.contains("TYPE-ERROR")
    }
}

/// Parse the card inventory.
///
/// The status is always the last token. A row that carries only
/// `rack shelf slot cfg-type status` (empty slot, card offline) has no
/// real type, port count or versions; those become `-` and `0`.
pub fn parse_card_inventory(raw: &str) -> Vec<CardRow> {
    clean_lines(raw)
        .into_iter()
        .filter_map(|line| {
            let caps = INVENTORY_ROW.captures(line)?;
            let rest: Vec<&str> = caps[5].split_whitespace().collect();
            let (&status, middle) = rest.split_last()?;

            let field = |i: usize| middle.get(i).map_or(UNKNOWN, |s| *s).to_string();
            Some(CardRow {
                rack: caps[1].parse().ok()?,
                shelf: caps[2].parse().ok()?,
                slot: caps[3].parse().ok()?,
                cfg_type: caps[4].to_string(),
                real_type: field(0),
                ports: middle.get(1).and_then(|p| p.parse().ok()).unwrap_or(0),
                hard_ver: field(2),
                soft_ver: field(3),
                status: status.to_string(),
            })
        })
        .collect()
}

/// Detail block of one card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardDetail {
    pub status: String,
    pub serial: String,
    pub cpu_percent: u32,
    pub memory_percent: u32,
    pub phy_memory_kb: u64,
    /// Compacted, e.g. `10d 5h`.
    pub uptime: String,
    pub last_restart_reason: String,
}

impl Default for CardDetail {
    fn default() -> Self {
        Self {
            status: UNKNOWN.to_string(),
            serial: UNKNOWN.to_string(),
            cpu_percent: 0,
            memory_percent: 0,
            phy_memory_kb: 0,
            uptime: UNKNOWN.to_string(),
            last_restart_reason: UNKNOWN.to_string(),
        }
    }
}

/// Parse `show card rack R shelf S slot N`.
///
/// The block is laid out as one or two `Key: Value` columns per line;
/// unknown keys are ignored and missing ones keep their defaults.
pub fn parse_card_detail(raw: &str) -> CardDetail {
    let mut detail = CardDetail::default();

    for line in clean_lines(raw) {
        for (key, value) in key_value_pairs(line) {
            match normalize_key(&key).as_str() {
                "status" => detail.status = text_or_unknown(&value),
                "serialnumber" | "serialno" | "sn" => detail.serial = text_or_unknown(&value),
                "cpuusage" | "cpu" | "cpuutilization" => detail.cpu_percent = percent(&value),
                "memoryusage" | "memusage" | "memoryutilization" => {
                    detail.memory_percent = percent(&value)
                }
                "phymemorysize" | "memorysize" => detail.phy_memory_kb = memory_kb(&value),
                "uptime" | "runningtime" => detail.uptime = compact_uptime(&value),
                "lastrestartreason" | "restartreason" => {
                    detail.last_restart_reason = text_or_unknown(&value)
                }
                _ => {}
            }
        }
    }

    detail
}

/// One row of the temperature table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CardTemperature {
    pub rack: u32,
    pub shelf: u32,
    pub slot: u32,
    pub celsius: f64,
}

/// Parse the temperature table. Rows without a numeric reading are
/// skipped.
pub fn parse_card_temperature(raw: &str) -> Vec<CardTemperature> {
    clean_lines(raw)
        .into_iter()
        .filter_map(|line| {
            let caps = TEMPERATURE_ROW.captures(line)?;
            Some(CardTemperature {
                rack: caps[1].parse().ok()?,
                shelf: caps[2].parse().ok()?,
                slot: caps[3].parse().ok()?,
                celsius: caps[4].parse().ok()?,
            })
        })
        .collect()
}
