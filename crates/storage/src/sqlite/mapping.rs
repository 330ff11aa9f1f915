use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::repository::{StorageError, StoredRecord};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn map_record_row(row: &sqlx::sqlite::SqliteRow) -> Result<StoredRecord, StorageError> {
    let payload: String = row.try_get("payload").map_err(ser)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(ser)?;
    Ok(StoredRecord {
        payload,
        updated_at,
    })
}

pub(crate) fn map_name_row(row: &sqlx::sqlite::SqliteRow) -> Result<String, StorageError> {
    row.try_get("name").map_err(ser)
}
