use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::repository::{RecordKey, RecordRepository, StorageError, StoredRecord};

use super::SqliteRepository;
use super::mapping::{conn, map_name_row, map_record_row};

#[async_trait]
impl RecordRepository for SqliteRepository {
    async fn get_record(&self, key: &RecordKey) -> Result<Option<StoredRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT payload, updated_at
            FROM records
            WHERE scope = ?1 AND name = ?2
            ",
        )
        .bind(key.scope())
        .bind(key.name())
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        row.as_ref().map(map_record_row).transpose()
    }

    async fn put_record(
        &self,
        key: &RecordKey,
        payload: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO records (scope, name, payload, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(scope, name) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key.scope())
        .bind(key.name())
        .bind(payload)
        .bind(updated_at)
        .execute(self.pool())
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn delete_record(&self, key: &RecordKey) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM records WHERE scope = ?1 AND name = ?2")
            .bind(key.scope())
            .bind(key.name())
            .execute(self.pool())
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn list_names(&self, scope: &str) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query("SELECT name FROM records WHERE scope = ?1 ORDER BY name")
            .bind(scope)
            .fetch_all(self.pool())
            .await
            .map_err(conn)?;
        rows.iter().map(map_name_row).collect()
    }
}
