//! Device rows: registration, lookup and offline marking.

use chrono::Utc;
use secrecy::ExposeSecret;

use super::Store;
use super::rows::map_device_row;
use crate::error::StoreError;
use crate::model::DeviceRecord;
use crate::transport::ConnectParams;

const SELECT_DEVICE: &str = r#"
    SELECT id, host, port, username, password, transport, name, status, last_sync
    FROM devices
"#;

impl Store {
    /// Register a device or update its connection details. Returns its id.
    pub async fn upsert_device(
        &self,
        params: &ConnectParams,
        name: Option<&str>,
    ) -> Result<i64, StoreError> {
        let now = Utc::now();
        let id = sqlx::query_scalar(
            r#"
            INSERT INTO devices (host, port, username, password, transport, name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (host) DO UPDATE SET
                port = excluded.port,
                username = excluded.username,
                password = excluded.password,
                transport = excluded.transport,
                name = COALESCE(excluded.name, devices.name),
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&params.host)
        .bind(i64::from(params.port))
        .bind(&params.username)
        .bind(params.password.expose_secret())
        .bind(params.kind.as_str())
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Id of the device row for `params.host`, creating an OFFLINE row with
    /// these connection details if none exists. Existing rows are untouched.
    pub async fn ensure_device(&self, params: &ConnectParams) -> Result<i64, StoreError> {
        let now = Utc::now();
        let id = sqlx::query_scalar(
            r#"
            INSERT INTO devices (host, port, username, password, transport, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (host) DO UPDATE SET host = devices.host
            RETURNING id
            "#,
        )
        .bind(&params.host)
        .bind(i64::from(params.port))
        .bind(&params.username)
        .bind(params.password.expose_secret())
        .bind(params.kind.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Flag the device OFFLINE, registering it if it was never seen.
    pub async fn mark_offline(&self, params: &ConnectParams) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO devices (host, port, username, password, transport, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 'OFFLINE', ?, ?)
            ON CONFLICT (host) DO UPDATE SET
                status = 'OFFLINE',
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&params.host)
        .bind(i64::from(params.port))
        .bind(&params.username)
        .bind(params.password.expose_secret())
        .bind(params.kind.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn device_by_id(&self, id: i64) -> Result<Option<DeviceRecord>, StoreError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_DEVICE))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(map_device_row))
    }

    pub async fn device_by_host(&self, host: &str) -> Result<Option<DeviceRecord>, StoreError> {
        let row = sqlx::query(&format!("{} WHERE host = ?", SELECT_DEVICE))
            .bind(host)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(map_device_row))
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        let rows = sqlx::query(&format!("{} ORDER BY host", SELECT_DEVICE))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(map_device_row).collect())
    }
}
