//! Transactional poll snapshot apply, plus the read side of what it writes.

use chrono::{DateTime, Utc};
use log::{debug, info};
use secrecy::ExposeSecret;
use sqlx::{Sqlite, Transaction};

use super::Store;
use super::onus::upsert_onu_query;
use super::rows::{map_card_row, map_port_row, map_traffic_row};
use crate::error::{ReconciliationError, StoreError};
use crate::model::{CardRecord, DeviceSnapshot, PonPortRecord, TrafficSample};
use crate::transport::ConnectParams;

impl Store {
    /// Apply one poll's snapshot as a single transaction and return the
    /// device id.
    ///
    /// The device row is upserted by host and flagged ONLINE; cards and PON
    /// ports are upserted by their natural keys and rows the device no
    /// longer reports are removed; ONUs are upserted by serial; traffic
    /// samples are appended. Any failure rolls the whole snapshot back.
    pub async fn apply_snapshot(
        &self,
        params: &ConnectParams,
        snapshot: &DeviceSnapshot,
    ) -> Result<i64, ReconciliationError> {
        let result = async {
            let mut tx = self.pool.begin().await?;
            let device_id = apply(&mut tx, params, snapshot).await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(device_id)
        }
        .await;

        result.map_err(|source| ReconciliationError {
            host: snapshot.host.clone(),
            source,
        })
    }

    /// Cards of `device_id` by rack, shelf and slot.
    pub async fn cards(&self, device_id: i64) -> Result<Vec<CardRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT rack, shelf, slot, cfg_type, real_type, status, cpu_percent, memory_percent,
                   temperature, serial, uptime, last_restart_reason
            FROM cards
            WHERE device_id = ?
            ORDER BY rack, shelf, slot
            "#,
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_card_row).collect())
    }

    /// PON ports of `device_id` by port index.
    pub async fn pon_ports(&self, device_id: i64) -> Result<Vec<PonPortRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT port, registered, online FROM pon_ports WHERE device_id = ? ORDER BY port",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_port_row).collect())
    }

    /// Traffic samples of `device_id`, oldest first.
    pub async fn traffic_samples(&self, device_id: i64) -> Result<Vec<TrafficSample>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT interface, sampled_at, rx_mbps, tx_mbps
            FROM traffic_samples
            WHERE device_id = ?
            ORDER BY sampled_at, id
            "#,
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_traffic_row).collect())
    }
}

async fn apply(
    tx: &mut Transaction<'_, Sqlite>,
    params: &ConnectParams,
    snapshot: &DeviceSnapshot,
) -> Result<i64, sqlx::Error> {
    let now = Utc::now();
    let device = &snapshot.device;

    // Credentials are only written for a device seen for the first time.
    let device_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO devices (
            host, port, username, password, transport, hostname, description, contact,
            location, uptime, max_cpu, max_memory, max_temperature, status, last_sync,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'ONLINE', ?, ?, ?)
        ON CONFLICT (host) DO UPDATE SET
            hostname = excluded.hostname,
            description = excluded.description,
            contact = excluded.contact,
            location = excluded.location,
            uptime = excluded.uptime,
            max_cpu = excluded.max_cpu,
            max_memory = excluded.max_memory,
            max_temperature = excluded.max_temperature,
            status = 'ONLINE',
            last_sync = excluded.last_sync,
            updated_at = excluded.updated_at
        RETURNING id
        "#,
    )
    .bind(&snapshot.host)
    .bind(i64::from(params.port))
    .bind(&params.username)
    .bind(params.password.expose_secret())
    .bind(params.kind.as_str())
    .bind(&device.hostname)
    .bind(&device.description)
    .bind(&device.contact)
    .bind(&device.location)
    .bind(&device.uptime)
    .bind(i64::from(device.max_cpu))
    .bind(i64::from(device.max_memory))
    .bind(device.max_temperature)
    .bind(now)
    .bind(now)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    for card in &snapshot.cards {
        upsert_card(tx, device_id, card, now).await?;
    }
    let stale_cards = sqlx::query("DELETE FROM cards WHERE device_id = ? AND synced_at <> ?")
        .bind(device_id)
        .bind(now)
        .execute(&mut **tx)
        .await?
        .rows_affected();

    for port in &snapshot.ports {
        upsert_port(tx, device_id, port, now).await?;
    }
    let stale_ports = sqlx::query("DELETE FROM pon_ports WHERE device_id = ? AND synced_at <> ?")
        .bind(device_id)
        .bind(now)
        .execute(&mut **tx)
        .await?
        .rows_affected();

    for onu in &snapshot.onus {
        upsert_onu_query(device_id, onu).execute(&mut **tx).await?;
    }

    for sample in &snapshot.traffic {
        sqlx::query(
            r#"
            INSERT INTO traffic_samples (device_id, interface, sampled_at, rx_mbps, tx_mbps)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(device_id)
        .bind(&sample.interface)
        .bind(sample.sampled_at)
        .bind(sample.rx_mbps)
        .bind(sample.tx_mbps)
        .execute(&mut **tx)
        .await?;
    }

    if stale_cards + stale_ports > 0 {
        debug!(
            "{}: removed {} stale cards, {} stale ports",
            snapshot.host, stale_cards, stale_ports
        );
    }
    info!(
        "{}: snapshot applied ({} cards, {} ports, {} onus, {} samples)",
        snapshot.host,
        snapshot.cards.len(),
        snapshot.ports.len(),
        snapshot.onus.len(),
        snapshot.traffic.len()
    );

    Ok(device_id)
}

async fn upsert_card(
    tx: &mut Transaction<'_, Sqlite>,
    device_id: i64,
    card: &CardRecord,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO cards (
            device_id, rack, shelf, slot, cfg_type, real_type, status, cpu_percent,
            memory_percent, temperature, serial, uptime, last_restart_reason, synced_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (device_id, rack, shelf, slot) DO UPDATE SET
            cfg_type = excluded.cfg_type,
            real_type = excluded.real_type,
            status = excluded.status,
            cpu_percent = excluded.cpu_percent,
            memory_percent = excluded.memory_percent,
            temperature = excluded.temperature,
            serial = excluded.serial,
            uptime = excluded.uptime,
            last_restart_reason = excluded.last_restart_reason,
            synced_at = excluded.synced_at
        "#,
    )
    .bind(device_id)
    .bind(i64::from(card.rack))
    .bind(i64::from(card.shelf))
    .bind(i64::from(card.slot))
    .bind(&card.cfg_type)
    .bind(&card.real_type)
    .bind(&card.status)
    .bind(i64::from(card.cpu_percent))
    .bind(i64::from(card.memory_percent))
    .bind(card.temperature)
    .bind(&card.serial)
    .bind(&card.uptime)
    .bind(&card.last_restart_reason)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn upsert_port(
    tx: &mut Transaction<'_, Sqlite>,
    device_id: i64,
    port: &PonPortRecord,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pon_ports (device_id, port, registered, online, offline, health, synced_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (device_id, port) DO UPDATE SET
            registered = excluded.registered,
            online = excluded.online,
            offline = excluded.offline,
            health = excluded.health,
            synced_at = excluded.synced_at
        "#,
    )
    .bind(device_id)
    .bind(&port.port)
    .bind(i64::from(port.registered))
    .bind(i64::from(port.online))
    .bind(i64::from(port.offline()))
    .bind(port.health().as_str())
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::model::{
        CardRecord, DeviceObservation, DeviceSnapshot, DeviceStatus, OnuRecord, PonPortRecord,
        TrafficSample,
    };
    use crate::testing::{connect_params, memory_store};

    fn card(slot: u32) -> CardRecord {
        CardRecord {
            rack: 1,
            shelf: 1,
            slot,
            cfg_type: "GTGO".to_string(),
            real_type: "GTGO".to_string(),
            status: "INSERVICE".to_string(),
            cpu_percent: 12,
            memory_percent: 40,
            temperature: 41.0,
            serial: "-".to_string(),
            uptime: "3d 4h".to_string(),
            last_restart_reason: "-".to_string(),
        }
    }

    fn onu(serial: &str, port: &str, onu_id: u32) -> OnuRecord {
        OnuRecord {
            serial: serial.to_string(),
            port: port.to_string(),
            onu_id,
            onu_type: "ZTE-F660".to_string(),
            vlan: None,
            pppoe_user: None,
            pppoe_pass: None,
            tcont_profile: None,
            name: None,
            description: None,
            phase_state: "working".to_string(),
            online: true,
            last_sync: Utc::now(),
        }
    }

    fn snapshot(cards: Vec<CardRecord>, onus: Vec<OnuRecord>) -> DeviceSnapshot {
        DeviceSnapshot {
            host: "olt.test".to_string(),
            device: DeviceObservation {
                hostname: "ZXAN".to_string(),
                description: "C320".to_string(),
                contact: "-".to_string(),
                location: "-".to_string(),
                uptime: "10d 2h".to_string(),
                max_cpu: 12,
                max_memory: 40,
                max_temperature: 41.0,
            },
            cards,
            ports: vec![PonPortRecord {
                port: "1/1/1".to_string(),
                registered: 2,
                online: 1,
            }],
            onus,
            traffic: vec![TrafficSample {
                interface: "gei_1/3/1".to_string(),
                sampled_at: Utc::now(),
                rx_mbps: 120.5,
                tx_mbps: 30.0,
            }],
        }
    }

    #[tokio::test]
    async fn test_apply_snapshot_writes_everything() {
        let store = memory_store().await;
        let snap = snapshot(vec![card(1), card(2)], vec![onu("SN1", "1/1/1", 1)]);

        let id = store.apply_snapshot(&connect_params(), &snap).await.unwrap();

        let device = store.device_by_id(id).await.unwrap().unwrap();
        assert_eq!(device.status, DeviceStatus::Online);
        assert!(device.last_sync.is_some());
        assert_eq!(store.cards(id).await.unwrap().len(), 2);
        let ports = store.pon_ports(id).await.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].offline(), 1);
        assert_eq!(store.onu_count().await.unwrap(), 1);
        assert_eq!(store.traffic_samples(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_snapshot_rolls_back_on_failure() {
        let store = memory_store().await;
        let snap = snapshot(vec![card(1)], vec![onu("SN1", "1/1/1", 1), onu("", "1/1/1", 2)]);

        let err = store.apply_snapshot(&connect_params(), &snap).await.unwrap_err();
        assert_eq!(err.host, "olt.test");

        assert!(store.device_by_host("olt.test").await.unwrap().is_none());
        assert_eq!(store.onu_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_moved_onu_keeps_one_row() {
        let store = memory_store().await;
        let params = connect_params();

        store
            .apply_snapshot(&params, &snapshot(vec![card(1)], vec![onu("SN123", "1/1/1", 5)]))
            .await
            .unwrap();
        store
            .apply_snapshot(&params, &snapshot(vec![card(1)], vec![onu("SN123", "1/1/2", 9)]))
            .await
            .unwrap();

        assert_eq!(store.onu_count().await.unwrap(), 1);
        let moved = store.onu_by_serial("SN123").await.unwrap().unwrap();
        assert_eq!(moved.port, "1/1/2");
        assert_eq!(moved.onu_id, 9);
    }

    #[tokio::test]
    async fn test_stale_cards_removed() {
        let store = memory_store().await;
        let params = connect_params();

        let id = store
            .apply_snapshot(&params, &snapshot(vec![card(1), card(2)], vec![]))
            .await
            .unwrap();
        store
            .apply_snapshot(&params, &snapshot(vec![card(2)], vec![]))
            .await
            .unwrap();

        let cards = store.cards(id).await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].slot, 2);
        assert_eq!(store.traffic_samples(id).await.unwrap().len(), 2);
    }
}
