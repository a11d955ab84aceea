//! # Key-value port (§6 "KV port")
//!
//! A narrow trait the rate limiter (C3) and revocation index (C10) both
//! speak, so they can share a backing store in production (Redis) and a
//! single in-memory fake in tests, independent of the concrete client.

use crate::errors::ApiError;
use async_trait::async_trait;
use std::time::Duration;

/// Minimal counter/flag store backing the rate limiter and revocation index.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Atomically increments the counter at `key`, setting `ttl` only if
    /// this call created the key. Returns the new count.
    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, ApiError>;

    /// Remaining time-to-live for `key`, or `None` if the key doesn't exist
    /// or carries no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, ApiError>;

    /// Deletes `key`. Idempotent.
    async fn del(&self, key: &str) -> Result<(), ApiError>;

    /// Sets `key` to `value` with `ttl`, only if `key` doesn't already
    /// exist. Returns `true` if the write happened.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, ApiError>;

    /// Returns `true` if `key` exists.
    async fn exists(&self, key: &str) -> Result<bool, ApiError>;
}

/// In-memory [`KvStore`] implementation, exposed (not just `#[cfg(test)]`)
/// so downstream crates can build fakes of their own services against it in
/// their own integration tests.
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;

    /// In-memory [`KvStore`] for unit and integration tests. TTLs are
    /// enforced lazily, on read, against a stored expiry instant.
    #[derive(Default)]
    pub struct FakeKvStore {
        entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
    }

    impl FakeKvStore {
        pub fn new() -> Self {
            Self::default()
        }

        fn is_live(entry: &(String, Option<Instant>)) -> bool {
            entry.1.map(|expiry| Instant::now() < expiry).unwrap_or(true)
        }
    }

    #[async_trait]
    impl KvStore for FakeKvStore {
        async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, ApiError> {
            let mut entries = self.entries.lock().unwrap();
            let live = entries.get(key).map(Self::is_live).unwrap_or(false);
            if !live {
                entries.insert(key.to_string(), ("1".to_string(), Some(Instant::now() + ttl)));
                return Ok(1);
            }
            let (value, expiry) = entries.get(key).cloned().unwrap();
            let new_count: i64 = value.parse().unwrap_or(0) + 1;
            entries.insert(key.to_string(), (new_count.to_string(), expiry));
            Ok(new_count)
        }

        async fn ttl(&self, key: &str) -> Result<Option<Duration>, ApiError> {
            let entries = self.entries.lock().unwrap();
            Ok(entries.get(key).and_then(|(_, expiry)| {
                expiry.map(|e| e.saturating_duration_since(Instant::now()))
            }))
        }

        async fn del(&self, key: &str) -> Result<(), ApiError> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, ApiError> {
            let mut entries = self.entries.lock().unwrap();
            let live = entries.get(key).map(Self::is_live).unwrap_or(false);
            if live {
                return Ok(false);
            }
            entries.insert(key.to_string(), (value.to_string(), Some(Instant::now() + ttl)));
            Ok(true)
        }

        async fn exists(&self, key: &str) -> Result<bool, ApiError> {
            let entries = self.entries.lock().unwrap();
            Ok(entries.get(key).map(Self::is_live).unwrap_or(false))
        }
    }

    #[tokio::test]
    async fn test_incr_with_ttl_creates_and_increments() {
        let store = FakeKvStore::new();
        assert_eq!(store.incr_with_ttl("k", Duration::from_secs(60)).await.unwrap(), 1);
        assert_eq!(store.incr_with_ttl("k", Duration::from_secs(60)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_set_if_absent_only_sets_once() {
        let store = FakeKvStore::new();
        assert!(store.set_if_absent("k", "v", Duration::from_secs(60)).await.unwrap());
        assert!(!store.set_if_absent("k", "v2", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn test_del_removes_key() {
        let store = FakeKvStore::new();
        store.set_if_absent("k", "v", Duration::from_secs(60)).await.unwrap();
        store.del("k").await.unwrap();
        assert!(!store.exists("k").await.unwrap());
    }
}
