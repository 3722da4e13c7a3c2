//! ONU rows, keyed globally by serial number.

use sqlx::Sqlite;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;

use super::Store;
use super::rows::map_onu_row;
use crate::error::StoreError;
use crate::model::OnuRecord;

/// Upsert for one ONU. An ONU that moved port or id updates its existing
/// row instead of gaining a second one.
pub(super) fn upsert_onu_query(device_id: i64, onu: &OnuRecord) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    sqlx::query(
        r#"
        INSERT INTO onus (
            serial, device_id, port, onu_id, onu_type, vlan, pppoe_user, pppoe_pass,
            tcont_profile, name, description, phase_state, online, last_sync
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (serial) DO UPDATE SET
            device_id = excluded.device_id,
            port = excluded.port,
            onu_id = excluded.onu_id,
            onu_type = excluded.onu_type,
            vlan = excluded.vlan,
            pppoe_user = excluded.pppoe_user,
            pppoe_pass = excluded.pppoe_pass,
            tcont_profile = excluded.tcont_profile,
            name = excluded.name,
            description = excluded.description,
            phase_state = excluded.phase_state,
            online = excluded.online,
            last_sync = excluded.last_sync
        "#,
    )
    .bind(onu.serial.as_str())
    .bind(device_id)
    .bind(onu.port.as_str())
    .bind(i64::from(onu.onu_id))
    .bind(onu.onu_type.as_str())
    .bind(onu.vlan.map(i64::from))
    .bind(onu.pppoe_user.as_deref())
    .bind(onu.pppoe_pass.as_deref())
    .bind(onu.tcont_profile.as_deref())
    .bind(onu.name.as_deref())
    .bind(onu.description.as_deref())
    .bind(onu.phase_state.as_str())
    .bind(onu.online)
    .bind(onu.last_sync)
}

const SELECT_ONU: &str = r#"
    SELECT serial, port, onu_id, onu_type, vlan, pppoe_user, pppoe_pass, tcont_profile,
           name, description, phase_state, online, last_sync
    FROM onus
"#;

impl Store {
    /// Write a single ONU outside any poll transaction.
    pub async fn upsert_onu(&self, device_id: i64, onu: &OnuRecord) -> Result<(), StoreError> {
        upsert_onu_query(device_id, onu).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn onu_by_serial(&self, serial: &str) -> Result<Option<OnuRecord>, StoreError> {
        let row = sqlx::query(&format!("{} WHERE serial = ?", SELECT_ONU))
            .bind(serial)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(map_onu_row))
    }

    /// ONUs last seen on `device_id`, by port then id.
    pub async fn onus(&self, device_id: i64) -> Result<Vec<OnuRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "{} WHERE device_id = ? ORDER BY port, onu_id",
            SELECT_ONU
        ))
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_onu_row).collect())
    }

    pub async fn onu_count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM onus")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
