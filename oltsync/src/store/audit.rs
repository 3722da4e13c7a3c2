//! Command audit log persistence.

use super::Store;
use super::rows::map_command_log_row;
use crate::error::StoreError;
use crate::model::CommandLogEntry;
use crate::session::AuditSink;

impl Store {
    /// Append one audit entry.
    pub async fn append_command_log(&self, entry: &CommandLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO command_logs (host, command, output, status, logged_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.host)
        .bind(&entry.command)
        .bind(&entry.output)
        .bind(entry.status.as_str())
        .bind(entry.logged_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent audit entries, newest first.
    pub async fn command_logs(&self, limit: u32) -> Result<Vec<CommandLogEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT host, command, output, status, logged_at
            FROM command_logs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_command_log_row).collect())
    }
}

impl AuditSink for Store {
    async fn append(&self, entry: &CommandLogEntry) -> Result<(), StoreError> {
        self.append_command_log(entry).await
    }
}
