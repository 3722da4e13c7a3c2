//! Parsers for OLT CLI output.
//!
//! Every parser is a pure function over the text returned by one command.
//! They are defensive by construction: a line that does not fit the
//! expected shape is skipped, and a field that cannot be extracted falls
//! back to a sentinel (`NaN`, `0`, [`UNKNOWN`]) instead of failing the
//! whole parse. Firmware versions disagree on column layouts often enough
//! that one odd line must never cost a poll.

pub mod alarm;
pub mod attenuation;
pub mod card;
pub mod interface;
pub mod onu_detail;
pub mod onu_state;
pub mod profile;
pub mod running_config;
pub mod system;
pub mod uncfg;
pub mod units;

pub use alarm::{AlarmEntry, parse_alarms};
pub use attenuation::{AttenuationReading, AttenuationRow, Direction, SignalBand, parse_attenuation};
pub use card::{
    CardDetail, CardRow, CardTemperature, parse_card_detail, parse_card_inventory,
    parse_card_temperature,
};
pub use interface::{
    InterfaceRates, LinkState, PortStatusRow, has_rate_marker, parse_interface_rates,
    parse_port_status,
};
pub use onu_detail::{OnuDetail, OnuSession, parse_onu_detail};
pub use onu_state::{OnuStateRow, parse_onu_state, port_occupancy};
pub use profile::{TcontProfile, VlanProfile, parse_tcont_profiles, parse_vlan_profiles, parse_vlan_summary};
pub use running_config::{OnuConfig, parse_onu_inventory};
pub use system::{SystemInfo, parse_system_group};
pub use uncfg::{UnconfiguredOnu, parse_unconfigured};

use std::sync::LazyLock;

use log::trace;
use regex::Regex;

/// Sentinel for text fields that could not be extracted.
pub const UNKNOWN: &str = "-";

/// `ZXAN#show card`, `ZXAN(config)#` and the like.
static PROMPT_ECHO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ZXAN[\w.\-]*(\([\w.\-]+\))?[#>]").unwrap());

/// Table rules made of dashes, equals signs and the like.
static SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\s\-=+*_]+$").unwrap());

/// Informational banners some firmware prints around output.
static BANNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(building configuration|current configuration|.*--more--)").unwrap()
});

static SEGMENT_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}|\t").unwrap());

static SPACE_BEFORE_COLON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+:").unwrap());

static PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9 _\-/().]*?)\s*:\s*(.*)$").unwrap());

/// Shared cleaning step: drop blank lines, table separators, banners and
/// echoed prompt lines. Trailing whitespace and carriage returns go too.
pub fn clean_lines(raw: &str) -> Vec<&str> {
    raw.lines()
        .map(|l| l.trim_end_matches(['\r', ' ', '\t']))
        .filter(|l| {
            let keep = !l.trim().is_empty()
                && !SEPARATOR.is_match(l)
                && !BANNER.is_match(l)
                && !PROMPT_ECHO.is_match(l);
            if !keep {
                trace!("clean_lines: dropping {:?}", l);
            }
            keep
        })
        .collect()
}

/// Extract `Key: Value` pairs from one line.
///
/// Handles both `Key: Value` in a single segment and the column layout
/// `Key:     Value     Other-Key:   Other value`, where runs of two or
/// more spaces separate segments and single spaces stay inside values.
/// Padding between a key and its colon (`Type     :4`) is tolerated.
pub fn key_value_pairs(line: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut pending: Option<String> = None;

    let line = SPACE_BEFORE_COLON.replace_all(line.trim(), ":");
    for segment in SEGMENT_SPLIT.split(&line) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let bare_key = segment.ends_with(':') && PAIR.is_match(segment);
        if let Some(key) = pending.take() {
            if !bare_key {
                pairs.push((key, segment.to_string()));
                continue;
            }
            pairs.push((key, String::new()));
        }

        if let Some(caps) = PAIR.captures(segment) {
            let key = caps[1].trim().to_string();
            let value = caps[2].trim();
            if value.is_empty() {
                pending = Some(key);
            } else {
                pairs.push((key, value.to_string()));
            }
        }
    }

    if let Some(key) = pending {
        pairs.push((key, String::new()));
    }
    pairs
}

/// Lowercase a key and drop everything but letters and digits, so
/// `CPU-Usage`, `Cpu Usage` and `cpu_usage` compare equal.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Text value or the sentinel when empty.
pub(crate) fn text_or_unknown(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}
