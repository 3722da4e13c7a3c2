//! T-CONT profile, VLAN profile and VLAN summary parsers.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{clean_lines, key_value_pairs, normalize_key};

static VLAN_LIST_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d,\-\s]+$").unwrap());

static VLAN_RANGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)(?:-(\d+))?").unwrap());

const MAX_VLAN: u16 = 4094;

/// A T-CONT bandwidth profile. Bandwidths are in kbps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TcontProfile {
    pub name: String,
    pub kind: Option<u8>,
    pub fixed_kbps: Option<u64>,
    pub assured_kbps: Option<u64>,
    pub max_kbps: Option<u64>,
}

impl TcontProfile {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: None,
            fixed_kbps: None,
            assured_kbps: None,
            max_kbps: None,
        }
    }
}

/// A VLAN profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VlanProfile {
    pub name: String,
    pub tag_mode: Option<String>,
    pub cvlan: Option<u16>,
}

fn is_profile_name(key: &str) -> bool {
    matches!(key, "profilename" | "name")
}

/// Parse T-CONT profiles. A `Profile name` key opens a new profile;
/// subsequent keys fill it until the next name.
pub fn parse_tcont_profiles(raw: &str) -> Vec<TcontProfile> {
    let mut profiles: Vec<TcontProfile> = Vec::new();

    for line in clean_lines(raw) {
        for (key, value) in key_value_pairs(line) {
            let key = normalize_key(&key);
            if is_profile_name(&key) {
                if !value.is_empty() {
                    profiles.push(TcontProfile::named(&value));
                }
                continue;
            }

            let Some(profile) = profiles.last_mut() else {
                continue;
            };
            let kbps = value.trim().parse::<u64>().ok();
            if key == "type" {
                profile.kind = value.trim().parse().ok();
            } else if key.starts_with("fbw") || key.starts_with("fixed") {
                profile.fixed_kbps = kbps;
            } else if key.starts_with("abw") || key.starts_with("assured") {
                profile.assured_kbps = kbps;
            } else if key.starts_with("mbw") || key.starts_with("max") {
                profile.max_kbps = kbps;
            }
        }
    }

    profiles
}

/// Parse VLAN profiles, keyed the same way as T-CONT profiles.
pub fn parse_vlan_profiles(raw: &str) -> Vec<VlanProfile> {
    let mut profiles: Vec<VlanProfile> = Vec::new();

    for line in clean_lines(raw) {
        for (key, value) in key_value_pairs(line) {
            let key = normalize_key(&key);
            if is_profile_name(&key) {
                if !value.is_empty() {
                    profiles.push(VlanProfile {
                        name: value,
                        tag_mode: None,
                        cvlan: None,
                    });
                }
                continue;
            }

            let Some(profile) = profiles.last_mut() else {
                continue;
            };
            match key.as_str() {
                "tagmode" => profile.tag_mode = Some(value),
                "cvlan" | "cvlanid" | "vlan" => profile.cvlan = value.trim().parse().ok(),
                _ => {}
            }
        }
    }

    profiles
}

/// Expand the VLAN summary into a sorted list of ids.
///
/// Only lines made purely of ids, commas and ranges are read, so
/// `1,100-102,300` yields `[1, 100, 101, 102, 300]`. Ranges are clamped
/// to the valid VLAN space.
pub fn parse_vlan_summary(raw: &str) -> Vec<u16> {
    let mut vlans = BTreeSet::new();

    for line in clean_lines(raw) {
        if !VLAN_LIST_LINE.is_match(line) {
            continue;
        }
        for caps in VLAN_RANGE.captures_iter(line) {
            let Ok(start) = caps[1].parse::<u16>() else {
                continue;
            };
            let end = caps
                .get(2)
                .and_then(|m| m.as_str().parse::<u16>().ok())
                .unwrap_or(start);
            let (start, end) = (start.clamp(1, MAX_VLAN), end.clamp(1, MAX_VLAN));
            if start <= end {
                vlans.extend(start..=end);
            }
        }
    }

    vlans.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcont_profiles() {
        let raw = "\
Profile name :20M
Type         :4
FBW(kbps)    :0
ABW(kbps)    :0
MBW(kbps)    :20480

Profile name :100M
Type         :4
MBW(kbps)    :102400
";
        let profiles = parse_tcont_profiles(raw);
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].name, "20M");
        assert_eq!(profiles[0].kind, Some(4));
        assert_eq!(profiles[0].fixed_kbps, Some(0));
        assert_eq!(profiles[0].max_kbps, Some(20480));
        assert_eq!(profiles[1].name, "100M");
        assert_eq!(profiles[1].assured_kbps, None);
        assert_eq!(profiles[1].max_kbps, Some(102400));
    }

    #[test]
    fn test_parse_vlan_profiles() {
        let raw = "\
Profile name:   v100
Tag mode:       tag
CVLAN:          100
Profile name:   v200
Tag mode:       transparent
";
        let profiles = parse_vlan_profiles(raw);
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].name, "v100");
        assert_eq!(profiles[0].tag_mode.as_deref(), Some("tag"));
        assert_eq!(profiles[0].cvlan, Some(100));
        assert_eq!(profiles[1].cvlan, None);
    }

    #[test]
    fn test_vlan_summary_expansion() {
        let raw = "\
All created vlan num: 6
Details are following:
1,100-102,300
300,4000
";
        assert_eq!(parse_vlan_summary(raw), vec![1, 100, 101, 102, 300, 4000]);
    }

    #[test]
    fn test_vlan_summary_clamps_and_ignores_reversed() {
        assert_eq!(parse_vlan_summary("4093-5000"), vec![4093, 4094]);
        assert!(parse_vlan_summary("20-10").is_empty());
    }
}
