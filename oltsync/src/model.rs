//! Domain records produced by parsing and consumed by reconciliation.
//!
//! Derived statuses (port health, device reachability) are computed from
//! raw counters here and never stored independently of them.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::transport::TransportKind;

/// Device reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceStatus {
    Online,
    Offline,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Online => "ONLINE",
            DeviceStatus::Offline => "OFFLINE",
        }
    }

    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("ONLINE") {
            DeviceStatus::Online
        } else {
            DeviceStatus::Offline
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored device row as read back for connecting.
#[derive(Debug)]
pub struct DeviceRecord {
    pub id: i64,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub transport: TransportKind,
    pub name: Option<String>,
    pub status: DeviceStatus,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Device-level facts and aggregates observed during one poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceObservation {
    pub hostname: String,
    pub description: String,
    pub contact: String,
    pub location: String,
    pub uptime: String,
    pub max_cpu: u32,
    pub max_memory: u32,
    pub max_temperature: f64,
}

/// One card/slot as reconciled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardRecord {
    pub rack: u32,
    pub shelf: u32,
    pub slot: u32,
    pub cfg_type: String,
    pub real_type: String,
    pub status: String,
    pub cpu_percent: u32,
    pub memory_percent: u32,
    pub temperature: f64,
    pub serial: String,
    pub uptime: String,
    pub last_restart_reason: String,
}

/// Health of a PON port derived from its ONU counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortHealth {
    Healthy,
    Partial,
    Down,
}

impl PortHealth {
    /// `Down` when ONUs are registered but none is online, `Partial` when
    /// some are online and some offline, otherwise `Healthy`.
    pub fn from_counts(registered: u32, online: u32) -> Self {
        let offline = registered.saturating_sub(online);
        if registered > 0 && online == 0 {
            PortHealth::Down
        } else if online > 0 && offline > 0 {
            PortHealth::Partial
        } else {
            PortHealth::Healthy
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PortHealth::Healthy => "healthy",
            PortHealth::Partial => "partial",
            PortHealth::Down => "down",
        }
    }
}

/// One PON port's ONU occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PonPortRecord {
    /// Port index such as `1/2/3`.
    pub port: String,
    pub registered: u32,
    pub online: u32,
}

impl PonPortRecord {
    pub fn offline(&self) -> u32 {
        self.registered.saturating_sub(self.online)
    }

    pub fn health(&self) -> PortHealth {
        PortHealth::from_counts(self.registered, self.online)
    }
}

/// One ONU as reconciled. Identity is `serial`; `port`/`onu_id` are
/// positional and may change between polls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnuRecord {
    pub serial: String,
    pub port: String,
    pub onu_id: u32,
    pub onu_type: String,
    pub vlan: Option<u16>,
    pub pppoe_user: Option<String>,
    pub pppoe_pass: Option<String>,
    pub tcont_profile: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Last observed phase state, `-` when absent from the state table.
    pub phase_state: String,
    pub online: bool,
    pub last_sync: DateTime<Utc>,
}

/// Uplink throughput sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficSample {
    pub interface: String,
    pub sampled_at: DateTime<Utc>,
    pub rx_mbps: f64,
    pub tx_mbps: f64,
}

/// Everything one successful poll observed, applied as one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub host: String,
    pub device: DeviceObservation,
    pub cards: Vec<CardRecord>,
    pub ports: Vec<PonPortRecord>,
    pub onus: Vec<OnuRecord>,
    pub traffic: Vec<TrafficSample>,
}

/// Outcome of one audited command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandStatus {
    Success,
    Error,
}

impl CommandStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandStatus::Success => "SUCCESS",
            CommandStatus::Error => "ERROR",
        }
    }
}

/// Audit record for one executed command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandLogEntry {
    pub host: String,
    pub command: String,
    /// Raw output on success, error message on failure.
    pub output: String,
    pub status: CommandStatus,
    pub logged_at: DateTime<Utc>,
}

impl CommandLogEntry {
    pub fn new(
        host: impl Into<String>,
        command: impl Into<String>,
        output: impl Into<String>,
        status: CommandStatus,
    ) -> Self {
        Self {
            host: host.into(),
            command: command.into(),
            output: output.into(),
            status,
            logged_at: Utc::now(),
        }
    }
}
