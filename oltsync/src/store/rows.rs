//! Row mapping helpers.

use secrecy::SecretString;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::model::{
    CardRecord, CommandLogEntry, CommandStatus, DeviceRecord, DeviceStatus, OnuRecord,
    PonPortRecord, TrafficSample,
};

/// Unsigned column stored as INTEGER; negative or oversized values read as 0.
fn u32_col(row: &SqliteRow, name: &str) -> u32 {
    u32::try_from(row.get::<i64, _>(name)).unwrap_or(0)
}

pub(super) fn map_device_row(row: &SqliteRow) -> DeviceRecord {
    let transport: String = row.get("transport");
    let status: String = row.get("status");
    DeviceRecord {
        id: row.get("id"),
        host: row.get("host"),
        port: u16::try_from(row.get::<i64, _>("port")).unwrap_or(0),
        username: row.get("username"),
        password: SecretString::from(row.get::<String, _>("password")),
        transport: transport.parse().unwrap_or_default(),
        name: row.get("name"),
        status: DeviceStatus::parse(&status),
        last_sync: row.get("last_sync"),
    }
}

pub(super) fn map_card_row(row: &SqliteRow) -> CardRecord {
    CardRecord {
        rack: u32_col(row, "rack"),
        shelf: u32_col(row, "shelf"),
        slot: u32_col(row, "slot"),
        cfg_type: row.get("cfg_type"),
        real_type: row.get("real_type"),
        status: row.get("status"),
        cpu_percent: u32_col(row, "cpu_percent"),
        memory_percent: u32_col(row, "memory_percent"),
        temperature: row.get("temperature"),
        serial: row.get("serial"),
        uptime: row.get("uptime"),
        last_restart_reason: row.get("last_restart_reason"),
    }
}

pub(super) fn map_port_row(row: &SqliteRow) -> PonPortRecord {
    PonPortRecord {
        port: row.get("port"),
        registered: u32_col(row, "registered"),
        online: u32_col(row, "online"),
    }
}

pub(super) fn map_onu_row(row: &SqliteRow) -> OnuRecord {
    OnuRecord {
        serial: row.get("serial"),
        port: row.get("port"),
        onu_id: u32_col(row, "onu_id"),
        onu_type: row.get("onu_type"),
        vlan: row
            .get::<Option<i64>, _>("vlan")
            .and_then(|v| u16::try_from(v).ok()),
        pppoe_user: row.get("pppoe_user"),
        pppoe_pass: row.get("pppoe_pass"),
        tcont_profile: row.get("tcont_profile"),
        name: row.get("name"),
        description: row.get("description"),
        phase_state: row.get("phase_state"),
        online: row.get::<i64, _>("online") != 0,
        last_sync: row.get("last_sync"),
    }
}

pub(super) fn map_traffic_row(row: &SqliteRow) -> TrafficSample {
    TrafficSample {
        interface: row.get("interface"),
        sampled_at: row.get("sampled_at"),
        rx_mbps: row.get("rx_mbps"),
        tx_mbps: row.get("tx_mbps"),
    }
}

pub(super) fn map_command_log_row(row: &SqliteRow) -> CommandLogEntry {
    let status: String = row.get("status");
    CommandLogEntry {
        host: row.get("host"),
        command: row.get("command"),
        output: row.get("output"),
        status: if status == CommandStatus::Success.as_str() {
            CommandStatus::Success
        } else {
            CommandStatus::Error
        },
        logged_at: row.get("logged_at"),
    }
}
