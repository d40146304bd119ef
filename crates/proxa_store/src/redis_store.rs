use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use crate::KeyValueStore;
use crate::error::StoreError;

/// Redis-backed store.
///
/// One `ConnectionManager` multiplexes a single connection for the whole
/// process; it is established once at startup and cloned per operation,
/// which is the redis crate's intended concurrent-use pattern.
pub struct RedisStore {
    manager: ConnectionManager,
    addr: String,
}

impl RedisStore {
    /// Connects and verifies the server with a PING before returning, so a
    /// dead store is caught at startup rather than on the first request.
    pub async fn connect(host: &str, port: u16, db: i64) -> Result<Self, StoreError> {
        let addr = format!("redis://{host}:{port}/{db}");
        info!(target: "proxa::store", %addr, "Connecting to store");

        let client = redis::Client::open(addr.as_str()).map_err(|e| StoreError::Connect {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;

        let mut manager =
            ConnectionManager::new(client)
                .await
                .map_err(|e| StoreError::Connect {
                    addr: addr.clone(),
                    reason: e.to_string(),
                })?;

        let _: String = redis::cmd("PING")
            .query_async(&mut manager)
            .await
            .map_err(|e| StoreError::Connect {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;

        info!(target: "proxa::store", %addr, "Store connection established");
        Ok(Self { manager, addr })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await.map_err(|e| StoreError::op("get", e))?;
        debug!(target: "proxa::store", %key, found = value.is_some(), "GET");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let () = conn
            .set_ex(key, value, ttl.as_secs())
            .await
            .map_err(|e| StoreError::op("set", e))?;
        debug!(target: "proxa::store", %key, ttl_secs = ttl.as_secs(), "SET");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let () = conn.del(key).await.map_err(|e| StoreError::op("del", e))?;
        debug!(target: "proxa::store", %key, "DEL");
        Ok(())
    }

    async fn close(&self) {
        // The multiplexed connection closes when the last clone drops;
        // nothing to flush. Logged so shutdown is visible in traces.
        info!(target: "proxa::store", addr = %self.addr, "Closing store connection");
    }
}
