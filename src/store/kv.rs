//! Key-value storage trait for the data domains.
//!
//! Each of the three logical data domains (primary, courses, transfers) is
//! backed by one independent implementation of this trait. Operations are
//! atomic and single-record; the trait deliberately offers nothing that
//! could span domains.

use async_trait::async_trait;
use serde_json::Value;

use super::error::StorageResult;

/// Storage interface for domain-scoped records.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a record by key. Returns `Ok(None)` if the key does not exist.
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Write a record, replacing any existing value for the key.
    ///
    /// Must be atomic - either fully succeeds or has no effect.
    async fn put(&self, key: &str, value: &Value) -> StorageResult<()>;

    /// Delete a record. Returns `true` if a record was removed.
    async fn delete(&self, key: &str) -> StorageResult<bool>;
}
