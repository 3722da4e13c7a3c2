//! `show system-group` parser.

use serde::Serialize;

use super::{UNKNOWN, clean_lines, normalize_key};

/// Device identity block. Absent fields are `-`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub description: String,
    pub contact: String,
    pub location: String,
    pub uptime: String,
    pub object_id: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            hostname: UNKNOWN.to_string(),
            description: UNKNOWN.to_string(),
            contact: UNKNOWN.to_string(),
            location: UNKNOWN.to_string(),
            uptime: UNKNOWN.to_string(),
            object_id: UNKNOWN.to_string(),
        }
    }
}

#[derive(Clone, Copy)]
enum Field {
    Hostname,
    Description,
    Contact,
    Location,
    Uptime,
    ObjectId,
}

/// Normalized labels and the field each fills.
const LABELS: &[(&str, Field)] = &[
    ("startedbefore", Field::Uptime),
    ("systemuptime", Field::Uptime),
    ("systemname", Field::Hostname),
    ("systemdescription", Field::Description),
    ("contactwith", Field::Contact),
    ("contact", Field::Contact),
    ("systemcontact", Field::Contact),
    ("location", Field::Location),
    ("systemlocation", Field::Location),
    ("systemobjectid", Field::ObjectId),
];

/// Parse the system group. Lines are `Label : value`; only the first
/// colon separates, so values may contain colons themselves.
pub fn parse_system_group(raw: &str) -> SystemInfo {
    let mut info = SystemInfo::default();

    for line in clean_lines(raw) {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        let label = normalize_key(label);
        let Some(&(_, field)) = LABELS.iter().find(|(name, _)| label == *name) else {
            continue;
        };

        let slot = match field {
            Field::Hostname => &mut info.hostname,
            Field::Description => &mut info.description,
            Field::Contact => &mut info.contact,
            Field::Location => &mut info.location,
            Field::Uptime => &mut info.uptime,
            Field::ObjectId => &mut info.object_id,
        };
        *slot = value.to_string();
    }

    info
}
