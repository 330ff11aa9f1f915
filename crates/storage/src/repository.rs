use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("invalid record key: {0}")]
    InvalidKey(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── KEYS AND RECORDS ──────────────────────────────────────────────────────────
//

/// Address of a stored record: a per-user `scope` plus a record `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    scope: String,
    name: String,
}

impl RecordKey {
    /// # Errors
    ///
    /// Returns `StorageError::InvalidKey` if either part is blank or contains `/`.
    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> Result<Self, StorageError> {
        let scope = scope.into();
        let name = name.into();
        for part in [&scope, &name] {
            if part.trim().is_empty() || part.contains('/') {
                return Err(StorageError::InvalidKey(format!("{scope}/{name}")));
            }
        }
        Ok(Self { scope, name })
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.name)
    }
}

/// Raw persisted payload with its last write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub payload: String,
    pub updated_at: DateTime<Utc>,
}

//
// ─── REPOSITORY CONTRACT ───────────────────────────────────────────────────────
//

#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Fetch a record, if present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_record(&self, key: &RecordKey) -> Result<Option<StoredRecord>, StorageError>;

    /// Insert or replace a record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn put_record(
        &self,
        key: &RecordKey,
        payload: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Remove a record. Removing an absent record succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects the delete.
    async fn delete_record(&self, key: &RecordKey) -> Result<(), StorageError>;

    /// Record names stored under `scope`, sorted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_names(&self, scope: &str) -> Result<Vec<String>, StorageError>;
}

/// Simple in-memory repository implementation for testing and embedding.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<BTreeMap<RecordKey, StoredRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordRepository for InMemoryRepository {
    async fn get_record(&self, key: &RecordKey) -> Result<Option<StoredRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn put_record(
        &self,
        key: &RecordKey,
        payload: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(
            key.clone(),
            StoredRecord {
                payload: payload.to_owned(),
                updated_at,
            },
        );
        Ok(())
    }

    async fn delete_record(&self, key: &RecordKey) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }

    async fn list_names(&self, scope: &str) -> Result<Vec<String>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .keys()
            .filter(|key| key.scope() == scope)
            .map(|key| key.name().to_owned())
            .collect())
    }
}

//
// ─── STORAGE FACADE ────────────────────────────────────────────────────────────
//

/// Wraps the record repository behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub records: Arc<dyn RecordRepository>,
}

impl Storage {
    #[must_use]
    pub fn new(records: Arc<dyn RecordRepository>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRepository::new()))
    }

    /// Load and decode a JSON record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the payload does not decode as `T`,
    /// or other storage errors from the backend.
    pub async fn load_json<T: DeserializeOwned>(
        &self,
        key: &RecordKey,
    ) -> Result<Option<T>, StorageError> {
        let Some(record) = self.records.get_record(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&record.payload)
            .map(Some)
            .map_err(|err| StorageError::Serialization(format!("{key}: {err}")))
    }

    /// Encode `value` as JSON and upsert it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or the write fails.
    pub async fn save_json<T: Serialize + Sync>(
        &self,
        key: &RecordKey,
        value: &T,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let payload = serde_json::to_string(value)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.records.put_record(key, &payload, updated_at).await?;
        tracing::debug!(%key, bytes = payload.len(), "record saved");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects the delete.
    pub async fn remove(&self, key: &RecordKey) -> Result<(), StorageError> {
        self.records.delete_record(key).await
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}
