use std::time::Duration;

use async_trait::async_trait;

pub mod error;
pub mod memory;
pub mod redis_store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Generic durable key/value store with per-entry expiry.
///
/// The proxy depends on nothing beyond these four operations; values are
/// opaque strings and keys are opaque to the store. The handle is shared by
/// every concurrent worker, so implementations must be safe for concurrent
/// use.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored value, or `None` when the key is absent or its
    /// expiry has passed.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value, expiring
    /// after `ttl`. The write is atomic: readers observe either the previous
    /// value or the full new one, never a partial entry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Removes `key`. Used for manual invalidation only; the proxy flow
    /// never calls this on its own.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Releases the underlying connection. Called exactly once at shutdown.
    async fn close(&self);
}
