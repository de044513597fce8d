//! Key set cache.
//!
//! Holds the converted keys from the most recent JWKS refresh together with a
//! single expiry instant. A refresh replaces the whole entry in one swap, so a
//! reader sees either the complete previous set or the complete new one.
//!
//! # Concurrency
//!
//! - Lookups take the shared lock
//! - The replacement map is built before the exclusive lock is taken; the
//!   exclusive section is a single assignment
//! - Concurrent misses may each refresh; the last swap wins and every swap is
//!   a complete set

use crate::auth::clock::Clock;
use crate::auth::keys::{convert_all, KeyRecord, PublicKey};
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Default cache TTL (30 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// One refresh worth of keys.
struct CachedKeySet {
    keys: HashMap<String, Arc<PublicKey>>,
    expires_at: DateTime<Utc>,
}

/// Cache of verification keys indexed by `kid`.
pub struct KeySetCache {
    entry: RwLock<Option<CachedKeySet>>,
    clock: Arc<dyn Clock>,
}

impl KeySetCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entry: RwLock::new(None),
            clock,
        }
    }

    /// Look up a key by `kid`.
    ///
    /// Returns `None` (a cache miss) when the cache is empty, expired, or does
    /// not contain `kid`.
    pub async fn get_key(&self, kid: &str) -> Option<Arc<PublicKey>> {
        let now = self.clock.now();
        let entry = self.entry.read().await;

        let key = entry
            .as_ref()
            .filter(|cached| cached.expires_at > now)
            .and_then(|cached| cached.keys.get(kid))
            .cloned();

        match &key {
            Some(_) => {
                tracing::debug!(target: "api.auth.cache", kid = %kid, "JWKS cache hit");
                metrics::record_jwks_cache_lookup("hit");
            }
            None => {
                tracing::debug!(target: "api.auth.cache", kid = %kid, "JWKS cache miss");
                metrics::record_jwks_cache_lookup("miss");
            }
        }

        key
    }

    /// Replace the cached set with the convertible subset of `records`.
    ///
    /// Records that fail conversion are skipped. Returns the number of keys
    /// now cached.
    pub async fn refresh(&self, records: &[KeyRecord], ttl: Duration) -> usize {
        let keys = convert_all(records);
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        let expires_at = now.checked_add_signed(ttl).unwrap_or(now);
        let count = keys.len();

        if count < records.len() {
            tracing::warn!(
                target: "api.auth.cache",
                received = records.len(),
                cached = count,
                "Some JWKS records were unusable"
            );
        }

        let replacement = CachedKeySet { keys, expires_at };

        {
            let mut entry = self.entry.write().await;
            *entry = Some(replacement);
        }

        metrics::set_jwks_cached_keys(count);
        tracing::debug!(target: "api.auth.cache", key_count = count, expires_at = %expires_at, "JWKS cache refreshed");

        count
    }

    /// Whether the cache holds an unexpired set.
    pub async fn is_warm(&self) -> bool {
        let now = self.clock.now();
        self.entry
            .read()
            .await
            .as_ref()
            .is_some_and(|cached| cached.expires_at > now)
    }

    /// Number of keys in the current entry, expired or not.
    pub async fn key_count(&self) -> usize {
        self.entry
            .read()
            .await
            .as_ref()
            .map_or(0, |cached| cached.keys.len())
    }

    /// Key ids of the current entry, read under a single lock acquisition.
    pub async fn key_ids(&self) -> Vec<String> {
        let entry = self.entry.read().await;
        let mut ids: Vec<String> = entry
            .as_ref()
            .map(|cached| cached.keys.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Drop the current entry.
    pub async fn clear(&self) {
        *self.entry.write().await = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use api_test_utils::TestKeypair;

    fn record(keypair: &TestKeypair) -> KeyRecord {
        serde_json::from_value(keypair.jwk()).unwrap()
    }

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn cache_with_clock() -> (KeySetCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        (KeySetCache::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_empty_cache_misses() {
        let (cache, _clock) = cache_with_clock();

        assert!(cache.get_key("key-1").await.is_none());
        assert!(!cache.is_warm().await);
        assert_eq!(cache.key_count().await, 0);
    }

    #[tokio::test]
    async fn test_refresh_then_hit() {
        let (cache, _clock) = cache_with_clock();

        let count = cache
            .refresh(&[record(&TestKeypair::primary("key-1"))], DEFAULT_CACHE_TTL)
            .await;

        assert_eq!(count, 1);
        assert!(cache.is_warm().await);
        let key = cache.get_key("key-1").await.unwrap();
        assert_eq!(key.kid(), "key-1");
    }

    #[tokio::test]
    async fn test_unknown_kid_misses_on_warm_cache() {
        let (cache, _clock) = cache_with_clock();
        cache
            .refresh(&[record(&TestKeypair::primary("key-1"))], DEFAULT_CACHE_TTL)
            .await;

        assert!(cache.get_key("key-2").await.is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_with_clock() {
        let (cache, clock) = cache_with_clock();
        cache
            .refresh(
                &[record(&TestKeypair::primary("key-1"))],
                Duration::from_secs(60),
            )
            .await;

        clock.advance(chrono::Duration::seconds(59));
        assert!(cache.get_key("key-1").await.is_some());

        clock.advance(chrono::Duration::seconds(1));
        assert!(cache.get_key("key-1").await.is_none(), "expired entry must miss");
        assert!(!cache.is_warm().await);
    }

    #[tokio::test]
    async fn test_refresh_replaces_whole_set() {
        let (cache, _clock) = cache_with_clock();
        cache
            .refresh(&[record(&TestKeypair::primary("old"))], DEFAULT_CACHE_TTL)
            .await;
        cache
            .refresh(&[record(&TestKeypair::secondary("new"))], DEFAULT_CACHE_TTL)
            .await;

        assert!(cache.get_key("old").await.is_none());
        assert!(cache.get_key("new").await.is_some());
        assert_eq!(cache.key_ids().await, vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn test_partial_key_set_tolerance() {
        let (cache, _clock) = cache_with_clock();
        let mut records: Vec<KeyRecord> = (1..=5)
            .map(|i| record(&TestKeypair::primary(&format!("key-{i}"))))
            .collect();
        records[2].e = "not base64!".to_string();

        let count = cache.refresh(&records, DEFAULT_CACHE_TTL).await;

        assert_eq!(count, 4);
        assert_eq!(
            cache.key_ids().await,
            vec!["key-1", "key-2", "key-4", "key-5"]
        );
    }

    #[tokio::test]
    async fn test_clear_empties_cache() {
        let (cache, _clock) = cache_with_clock();
        cache
            .refresh(&[record(&TestKeypair::primary("key-1"))], DEFAULT_CACHE_TTL)
            .await;

        cache.clear().await;

        assert!(cache.get_key("key-1").await.is_none());
        assert_eq!(cache.key_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_never_observe_mixed_set() {
        let (cache, _clock) = cache_with_clock();
        let cache = Arc::new(cache);

        let set_a: Vec<KeyRecord> = (1..=4)
            .map(|i| record(&TestKeypair::primary(&format!("a-{i}"))))
            .collect();
        let set_b: Vec<KeyRecord> = (1..=4)
            .map(|i| record(&TestKeypair::secondary(&format!("b-{i}"))))
            .collect();
        let ids_a: Vec<String> = set_a.iter().map(|r| r.kid.clone()).collect();
        let ids_b: Vec<String> = set_b.iter().map(|r| r.kid.clone()).collect();

        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for round in 0..200 {
                    let set = if round % 2 == 0 { &set_a } else { &set_b };
                    cache.refresh(set, DEFAULT_CACHE_TTL).await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let ids_a = ids_a.clone();
            let ids_b = ids_b.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..200 {
                    let ids = cache.key_ids().await;
                    assert!(
                        ids.is_empty() || ids == ids_a || ids == ids_b,
                        "observed a mixed key set: {ids:?}"
                    );
                    tokio::task::yield_now().await;
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
