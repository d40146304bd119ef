use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use proxa_cache::{CacheEntry, CacheKey};
use proxa_store::KeyValueStore;
use tracing::{debug, warn};

use crate::error::ProxyError;
use crate::origin::OriginClient;

/// Whether a response was served from the store or fetched from the origin.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CacheOutcome {
    Hit,
    Miss,
}

/// What the handler gives back: the payload plus how it was obtained.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Proxied {
    pub payload: Vec<u8>,
    pub outcome: CacheOutcome,
}

/// Orchestrates the lookup → fetch → store flow for every inbound request.
///
/// Holds no lock across requests; the store get/set and the origin fetch are
/// the only await points. The handler is shared (`Arc`) by all concurrent
/// workers. Concurrent misses for the same key may each fetch and each
/// write; entries are immutable so the last writer wins and readers observe
/// one complete entry either way.
pub struct ProxyHandler {
    store: Arc<dyn KeyValueStore>,
    origin_client: Arc<dyn OriginClient>,
    origin: String,
    ttl: Duration,
}

impl ProxyHandler {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        origin_client: Arc<dyn OriginClient>,
        origin: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            origin_client,
            origin: origin.into(),
            ttl,
        }
    }

    /// Serves one request: from the store when a valid entry exists, from
    /// the origin otherwise.
    ///
    /// Store and decode failures degrade to a miss; only origin failures
    /// propagate, and nothing is cached for them.
    pub async fn handle(
        &self,
        method: &str,
        path: &str,
        headers: &BTreeMap<String, String>,
        body: &[u8],
    ) -> Result<Proxied, ProxyError> {
        let key = CacheKey::build(method, path, &self.origin);

        if let Some(entry) = self.lookup(&key).await {
            debug!(target: "proxa::proxy", %method, %path, "Cache hit");
            return Ok(Proxied {
                payload: entry.payload,
                outcome: CacheOutcome::Hit,
            });
        }

        debug!(target: "proxa::proxy", %method, %path, "Cache miss; forwarding to origin");

        let url = format!("{}{}", self.origin, path);
        let payload = self.origin_client.fetch(&url).await?;

        let entry = CacheEntry::new(
            method,
            path,
            body.to_vec(),
            headers.clone(),
            &self.origin,
            payload.clone(),
        );
        self.store_entry(&key, &entry).await;

        Ok(Proxied {
            payload,
            outcome: CacheOutcome::Miss,
        })
    }

    /// Cache lookup. Any store or decode failure is absorbed here and
    /// reported as a miss, so the request is served from the origin instead.
    async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        let blob = match self.store.get(key.as_str()).await {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(err) => {
                warn!(
                    target: "proxa::proxy",
                    %key,
                    error = %err,
                    "Store lookup failed; treating as miss"
                );
                return None;
            }
        };

        match CacheEntry::decode(&blob) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(
                    target: "proxa::proxy",
                    %key,
                    error = %err,
                    "Stored entry is malformed; refetching from origin"
                );
                None
            }
        }
    }

    /// Best-effort write. A failed set drops the cached entry, never the
    /// request.
    async fn store_entry(&self, key: &CacheKey, entry: &CacheEntry) {
        let blob = match entry.encode() {
            Ok(blob) => blob,
            Err(err) => {
                warn!(
                    target: "proxa::proxy",
                    %key,
                    error = %err,
                    "Entry failed to serialize; skipping store write"
                );
                return;
            }
        };

        if let Err(err) = self.store.set(key.as_str(), &blob, self.ttl).await {
            warn!(
                target: "proxa::proxy",
                %key,
                error = %err,
                "Store write failed; dropping cached entry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use proxa_cache::CacheKey;
    use proxa_store::{KeyValueStore, MemoryStore, StoreError};

    use super::{CacheOutcome, ProxyHandler};
    use crate::error::ProxyError;
    use crate::origin::{FetchError, OriginClient};

    const ORIGIN: &str = "http://localhost:9000";

    /// Origin double that serves a fixed payload and counts fetches.
    struct RecordingOrigin {
        payload: Vec<u8>,
        fetches: AtomicUsize,
        delay: Duration,
    }

    impl RecordingOrigin {
        fn new(payload: &[u8]) -> Self {
            Self {
                payload: payload.to_vec(),
                fetches: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        fn slow(payload: &[u8], delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new(payload)
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OriginClient for RecordingOrigin {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.payload.clone())
        }
    }

    /// Origin double that always fails.
    struct FailingOrigin {
        error: fn() -> FetchError,
    }

    #[async_trait]
    impl OriginClient for FailingOrigin {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            Err((self.error)())
        }
    }

    /// Store double whose every operation fails, as during an outage.
    struct UnavailableStore;

    #[async_trait]
    impl KeyValueStore for UnavailableStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Op {
                op: "get",
                reason: "connection refused".into(),
            })
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
            Err(StoreError::Op {
                op: "set",
                reason: "connection refused".into(),
            })
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Op {
                op: "del",
                reason: "connection refused".into(),
            })
        }

        async fn close(&self) {}
    }

    /// Wrapper that counts writes going into an inner store.
    struct CountingStore {
        inner: MemoryStore,
        sets: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                sets: AtomicUsize::new(0),
            }
        }

        fn set_count(&self) -> usize {
            self.sets.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeyValueStore for CountingStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.inner.delete(key).await
        }

        async fn close(&self) {}
    }

    fn handler(store: Arc<dyn KeyValueStore>, origin: Arc<dyn OriginClient>) -> ProxyHandler {
        ProxyHandler::new(store, origin, ORIGIN, Duration::from_secs(300))
    }

    fn no_headers() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let store = Arc::new(CountingStore::new());
        let origin = Arc::new(RecordingOrigin::new(b"user one"));
        let handler = handler(store.clone(), origin.clone());

        let first = handler
            .handle("GET", "/users/1", &no_headers(), b"")
            .await
            .expect("first call");
        assert_eq!(first.outcome, CacheOutcome::Miss);
        assert_eq!(first.payload, b"user one");
        assert_eq!(origin.fetch_count(), 1);
        assert_eq!(store.set_count(), 1);

        let second = handler
            .handle("GET", "/users/1", &no_headers(), b"")
            .await
            .expect("second call");
        assert_eq!(second.outcome, CacheOutcome::Hit);
        assert_eq!(second.payload, b"user one");
        // Hit path: zero extra fetches, zero extra writes.
        assert_eq!(origin.fetch_count(), 1);
        assert_eq!(store.set_count(), 1);
    }

    #[tokio::test]
    async fn different_method_is_a_separate_cacheable_unit() {
        let store = Arc::new(MemoryStore::new());
        let origin = Arc::new(RecordingOrigin::new(b"payload"));
        let handler = handler(store, origin.clone());

        let get = handler
            .handle("GET", "/users/1", &no_headers(), b"")
            .await
            .expect("get");
        let post = handler
            .handle("POST", "/users/1", &no_headers(), b"")
            .await
            .expect("post");

        assert_eq!(get.outcome, CacheOutcome::Miss);
        assert_eq!(post.outcome, CacheOutcome::Miss);
        assert_eq!(origin.fetch_count(), 2);
    }

    #[tokio::test]
    async fn expired_entry_misses_again() {
        let store = Arc::new(MemoryStore::new());
        let origin = Arc::new(RecordingOrigin::new(b"fresh"));
        let handler = ProxyHandler::new(
            store,
            origin.clone(),
            ORIGIN,
            Duration::from_millis(20),
        );

        let first = handler
            .handle("GET", "/feed", &no_headers(), b"")
            .await
            .expect("first");
        assert_eq!(first.outcome, CacheOutcome::Miss);

        tokio::time::sleep(Duration::from_millis(60)).await;

        let second = handler
            .handle("GET", "/feed", &no_headers(), b"")
            .await
            .expect("second");
        assert_eq!(second.outcome, CacheOutcome::Miss);
        assert_eq!(origin.fetch_count(), 2);
    }

    #[tokio::test]
    async fn store_outage_degrades_to_pass_through() {
        let store = Arc::new(UnavailableStore);
        let origin = Arc::new(RecordingOrigin::new(b"still served"));
        let handler = handler(store, origin.clone());

        for expected_fetches in 1..=2 {
            let proxied = handler
                .handle("GET", "/users/1", &no_headers(), b"")
                .await
                .expect("request must survive a store outage");
            assert_eq!(proxied.payload, b"still served");
            assert_eq!(proxied.outcome, CacheOutcome::Miss);
            assert_eq!(origin.fetch_count(), expected_fetches);
        }
    }

    #[tokio::test]
    async fn origin_transport_failure_propagates_and_writes_nothing() {
        let store = Arc::new(CountingStore::new());
        let origin = Arc::new(FailingOrigin {
            error: || FetchError::Transport {
                reason: "connection reset".into(),
            },
        });
        let handler = handler(store.clone(), origin);

        let err = handler
            .handle("GET", "/users/1", &no_headers(), b"")
            .await
            .expect_err("fetch failure must propagate");
        assert!(matches!(
            err,
            ProxyError::Origin(FetchError::Transport { .. })
        ));
        assert_eq!(store.set_count(), 0);
    }

    #[tokio::test]
    async fn origin_http_error_is_never_cached() {
        let store = Arc::new(CountingStore::new());
        let origin = Arc::new(FailingOrigin {
            error: || FetchError::Status { status: 503 },
        });
        let handler = handler(store.clone(), origin);

        let err = handler
            .handle("GET", "/busy", &no_headers(), b"")
            .await
            .expect_err("status failure must propagate");
        assert!(matches!(
            err,
            ProxyError::Origin(FetchError::Status { status: 503 })
        ));
        assert_eq!(store.set_count(), 0);
    }

    #[tokio::test]
    async fn malformed_stored_entry_self_heals() {
        let store = Arc::new(MemoryStore::new());
        let origin = Arc::new(RecordingOrigin::new(b"repaired"));

        // Poison the exact key the handler will look up.
        let key = CacheKey::build("GET", "/users/1", ORIGIN);
        store
            .set(key.as_str(), "definitely not an entry", Duration::from_secs(300))
            .await
            .expect("seed");

        let handler = handler(store.clone(), origin.clone());
        let proxied = handler
            .handle("GET", "/users/1", &no_headers(), b"")
            .await
            .expect("must self-heal");
        assert_eq!(proxied.outcome, CacheOutcome::Miss);
        assert_eq!(proxied.payload, b"repaired");
        assert_eq!(origin.fetch_count(), 1);

        // The poisoned blob was replaced by a decodable entry.
        let healed = handler
            .handle("GET", "/users/1", &no_headers(), b"")
            .await
            .expect("hit after heal");
        assert_eq!(healed.outcome, CacheOutcome::Hit);
        assert_eq!(origin.fetch_count(), 1);
    }

    // There is deliberately no single-flight guard: two concurrent misses
    // for the same key each fetch from the origin and each write. Entries
    // are immutable, so the last writer wins and both callers get a full
    // payload. This test pins the non-guarantee.
    #[tokio::test]
    async fn concurrent_identical_misses_both_fetch() {
        let store = Arc::new(CountingStore::new());
        let origin = Arc::new(RecordingOrigin::slow(b"dup", Duration::from_millis(40)));
        let handler = handler(store.clone(), origin.clone());

        let headers = no_headers();
        let (a, b) = tokio::join!(
            handler.handle("GET", "/users/1", &headers, b""),
            handler.handle("GET", "/users/1", &headers, b"")
        );

        let a = a.expect("first concurrent call");
        let b = b.expect("second concurrent call");
        assert_eq!(a.outcome, CacheOutcome::Miss);
        assert_eq!(b.outcome, CacheOutcome::Miss);
        assert_eq!(a.payload, b.payload);
        assert_eq!(origin.fetch_count(), 2);
        assert_eq!(store.set_count(), 2);
    }

    #[tokio::test]
    async fn request_context_is_stored_with_the_entry() {
        let store = Arc::new(MemoryStore::new());
        let origin = Arc::new(RecordingOrigin::new(b"ok"));
        let handler = handler(store.clone(), origin);

        let mut headers = BTreeMap::new();
        headers.insert("X-Trace".to_string(), "abc".to_string());
        handler
            .handle("PUT", "/things/7", &headers, b"{\"name\":\"thing\"}")
            .await
            .expect("miss");

        let key = CacheKey::build("PUT", "/things/7", ORIGIN);
        let blob = store
            .get(key.as_str())
            .await
            .expect("get")
            .expect("entry present");
        let entry = proxa_cache::CacheEntry::decode(&blob).expect("decodable");
        assert_eq!(entry.method, "PUT");
        assert_eq!(entry.path, "/things/7");
        assert_eq!(entry.origin, ORIGIN);
        assert_eq!(entry.request_body, b"{\"name\":\"thing\"}");
        assert_eq!(entry.request_headers.get("x-trace"), Some(&"abc".to_string()));
        assert_eq!(entry.payload, b"ok");
    }
}
