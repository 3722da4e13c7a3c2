//! Running-configuration parser: reconstructs the declared ONU inventory.
//!
//! Three kinds of block contribute to one ONU, joined by `(port, onu_id)`:
//!
//! ```text
//! interface gpon-olt_1/2/3          declaration: onu <id> type <t> sn <serial>
//!   onu 5 type ZTE sn ABCD1234
//! !
//! interface gpon-onu_1/2/3:5        tcont profile, name, description
//!   name Lobby
//!   tcont 1 profile 20M
//! !
//! pon-onu-mng gpon-onu_1/2/3:5      vlan, PPPoE credentials
//!   service 1 gemport 1 vlan 100
//!   wan-ip 1 mode pppoe username u1 password p1 vlan-profile v100 host 1
//! !
//! ```
//!
//! A block ends at `!`, `$`, `exit`, or the next unindented top-level
//! keyword. Only the declaration creates an ONU; the other blocks enrich
//! an existing declaration and are ignored otherwise.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::clean_lines;

static OLT_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^interface\s+gpon-olt_(\d+/\d+/\d+)\s*$").unwrap());

static ONU_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^interface\s+gpon-onu_(\d+/\d+/\d+):(\d+)\s*$").unwrap());

static MNG_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^pon-onu-mng\s+gpon-onu_(\d+/\d+/\d+):(\d+)\s*$").unwrap());

static TOP_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(interface|pon-onu-mng|pon|gpon|vlan|end|hostname|line|snmp-server|ip|router)\b")
        .unwrap()
});

static DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^onu\s+(\d+)\s+type\s+(\S+)\s+sn\s+(\S+)").unwrap());

static TCONT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^tcont\s+\d+(?:\s+name\s+\S+)?\s+profile\s+(\S+)").unwrap()
});

static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^name\s+(.+)$").unwrap());

static DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^description\s+(.+)$").unwrap());

static SERVICE_PORT_VLAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^service-port\s+\d+.*\bvlan\s+(\d+)").unwrap());

static VLAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bvlan\s+(\d+)\b").unwrap());

static PPPOE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\busername\s+(\S+)\s+password\s+(\S+)").unwrap());

/// One ONU as declared in the running configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OnuConfig {
    pub port: String,
    pub onu_id: u32,
    pub onu_type: String,
    pub serial: String,
    pub vlan: Option<u16>,
    pub pppoe_user: Option<String>,
    pub pppoe_pass: Option<String>,
    pub tcont_profile: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Default)]
struct OnuInterface {
    tcont_profile: Option<String>,
    name: Option<String>,
    description: Option<String>,
    service_vlan: Option<u16>,
}

#[derive(Default)]
struct OnuManagement {
    vlan: Option<u16>,
    pppoe: Option<(String, String)>,
}

/// A header line's captures plus its trimmed body lines.
struct Block<'a> {
    header: Captures<'a>,
    body: Vec<&'a str>,
}

fn is_terminator(line: &str) -> bool {
    matches!(line.trim(), "!" | "$" | "exit")
}

fn is_indented(line: &str) -> bool {
    line.starts_with([' ', '\t'])
}

/// Collect every block whose header matches `header`.
fn scan_blocks<'a>(lines: &[&'a str], header: &Regex) -> Vec<Block<'a>> {
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(caps) = header.captures(lines[i].trim()) else {
            i += 1;
            continue;
        };

        let mut body = Vec::new();
        i += 1;
        while i < lines.len() {
            let line = lines[i];
            if is_terminator(line) || (!is_indented(line) && TOP_LEVEL.is_match(line)) {
                break;
            }
            body.push(line.trim());
            i += 1;
        }
        blocks.push(Block { header: caps, body });
    }

    blocks
}

fn onu_key(caps: &Captures<'_>) -> Option<(String, u32)> {
    Some((caps[1].to_string(), caps[2].parse().ok()?))
}

/// Reconstruct the declared ONU inventory from `show running` output.
///
/// ONUs appear in declaration order. Fields whose block is missing or
/// does not mention them are `None`.
pub fn parse_onu_inventory(raw: &str) -> Vec<OnuConfig> {
    let lines = clean_lines(raw);

    let mut interfaces: HashMap<(String, u32), OnuInterface> = HashMap::new();
    for block in scan_blocks(&lines, &ONU_HEADER) {
        let Some(key) = onu_key(&block.header) else {
            continue;
        };
        let entry = interfaces.entry(key).or_default();
        for line in block.body {
            if let Some(c) = TCONT.captures(line) {
                entry.tcont_profile.get_or_insert_with(|| c[1].to_string());
            } else if let Some(c) = NAME.captures(line) {
                entry.name = Some(c[1].trim().to_string());
            } else if let Some(c) = DESCRIPTION.captures(line) {
                entry.description = Some(c[1].trim().to_string());
            } else if let Some(c) = SERVICE_PORT_VLAN.captures(line) {
                if entry.service_vlan.is_none() {
                    entry.service_vlan = c[1].parse().ok();
                }
            }
        }
    }

    let mut management: HashMap<(String, u32), OnuManagement> = HashMap::new();
    for block in scan_blocks(&lines, &MNG_HEADER) {
        let Some(key) = onu_key(&block.header) else {
            continue;
        };
        let entry = management.entry(key).or_default();
        for line in block.body {
            if entry.pppoe.is_none() {
                if let Some(c) = PPPOE.captures(line) {
                    entry.pppoe = Some((c[1].to_string(), c[2].to_string()));
                }
            }
            if entry.vlan.is_none() {
                if let Some(c) = VLAN.captures(line) {
                    entry.vlan = c[1].parse().ok();
                }
            }
        }
    }

    let mut onus = Vec::new();
    for block in scan_blocks(&lines, &OLT_HEADER) {
        let port = &block.header[1];
        for line in block.body {
            let Some(c) = DECLARATION.captures(line) else {
                continue;
            };
            let Ok(onu_id) = c[1].parse::<u32>() else {
                continue;
            };

            let key = (port.to_string(), onu_id);
            let interface = interfaces.remove(&key).unwrap_or_default();
            let mng = management.remove(&key).unwrap_or_default();
            let (pppoe_user, pppoe_pass) = match mng.pppoe {
                Some((user, pass)) => (Some(user), Some(pass)),
                None => (None, None),
            };

            onus.push(OnuConfig {
                port: key.0,
                onu_id,
                onu_type: c[2].to_string(),
                serial: c[3].to_string(),
                vlan: mng.vlan.or(interface.service_vlan),
                pppoe_user,
                pppoe_pass,
                tcont_profile: interface.tcont_profile,
                name: interface.name,
                description: interface.description,
            });
        }
    }

    onus
}
