//! Byte-level key-value storage abstraction

use async_trait::async_trait;

use crate::error::Result;

/// Narrow persistence interface shared by the durable and in-memory
/// backends. Values are opaque serialized records; both backends must
/// round-trip bytes losslessly.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the bytes stored under `key`, if any
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write `bytes` under `key`, replacing any previous value
    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Remove `key`; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Enumerate every key currently present in the backend
    async fn list_keys(&self) -> Result<Vec<String>>;
}
