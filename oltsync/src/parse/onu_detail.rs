//! `show gpon onu detail-info` parser.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{UNKNOWN, clean_lines, normalize_key, text_or_unknown};

static DISTANCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*m\b").unwrap());

/// `   1   2024-01-01 10:00:00    2024-01-02 11:00:00     DyingGasp`
static HISTORY_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*\d+\s+(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\s+(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\s*(\S*)\s*$",
    )
    .unwrap()
});

/// One registration period from the authentication history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnuSession {
    pub auth_time: String,
    /// `None` while the session is still up.
    pub offline_time: Option<String>,
    pub cause: Option<String>,
}

/// Detail for one ONU. Absent text fields are `-`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnuDetail {
    pub interface: String,
    pub name: String,
    pub onu_type: String,
    pub state: String,
    pub admin_state: String,
    pub phase_state: String,
    pub serial: String,
    pub description: String,
    pub distance_m: Option<u32>,
    pub online_duration: String,
    pub history: Vec<OnuSession>,
}

impl Default for OnuDetail {
    fn default() -> Self {
        let unknown = || UNKNOWN.to_string();
        Self {
            interface: unknown(),
            name: unknown(),
            onu_type: unknown(),
            state: unknown(),
            admin_state: unknown(),
            phase_state: unknown(),
            serial: unknown(),
            description: unknown(),
            distance_m: None,
            online_duration: unknown(),
            history: Vec::new(),
        }
    }
}

/// Parse the detail block. Keys are split at the first colon; history
/// rows are recognized by their leading index and two timestamps.
pub fn parse_onu_detail(raw: &str) -> OnuDetail {
    let mut detail = OnuDetail::default();

    for line in clean_lines(raw) {
        if let Some(caps) = HISTORY_ROW.captures(line) {
            let offline = &caps[2];
            let cause = &caps[3];
            detail.history.push(OnuSession {
                auth_time: caps[1].to_string(),
                offline_time: (!offline.starts_with("0000")).then(|| offline.to_string()),
                cause: (!cause.is_empty()).then(|| cause.to_string()),
            });
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match normalize_key(key).as_str() {
            "onuinterface" => detail.interface = text_or_unknown(value),
            "name" => detail.name = text_or_unknown(value),
            "type" => detail.onu_type = text_or_unknown(value),
            "state" => detail.state = text_or_unknown(value),
            "adminstate" => detail.admin_state = text_or_unknown(value),
            "phasestate" => detail.phase_state = text_or_unknown(value),
            "serialnumber" => detail.serial = text_or_unknown(value),
            "description" => detail.description = text_or_unknown(value),
            "onudistance" => {
                detail.distance_m = DISTANCE.captures(value).and_then(|c| c[1].parse().ok())
            }
            "onlineduration" => detail.online_duration = text_or_unknown(value),
            _ => {}
        }
    }

    detail
}
