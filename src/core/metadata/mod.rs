//! Tick size / minimum order size caching (spec.md §4.3).
//!
//! Metadata is fetched lazily on first access and cached with a 24h TTL.
//! Tick-size lookups are load-bearing for order pricing and propagate
//! failures; minimum-order-size lookups fall back to a conservative
//! default rather than blocking detection.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::sleep;
use tracing::warn;

use crate::core::domain::{MarketId, TokenId};
use crate::error::{Error, Result};

const DEFAULT_TICK_SIZE: Decimal = dec!(0.01);
const DEFAULT_MIN_ORDER_SIZE: Decimal = dec!(5.0);
const TTL: Duration = Duration::from_secs(24 * 60 * 60);
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(5);
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct TokenMetadata {
    pub tick_size: Decimal,
    pub min_order_size: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl TokenMetadata {
    fn is_stale(&self) -> bool {
        Utc::now().signed_duration_since(self.fetched_at).to_std().map(|d| d > TTL).unwrap_or(true)
    }
}

/// A transient error (429, 5xx, timeout) is retried with backoff; a 4xx
/// is treated as permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Retryable,
    Permanent,
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_tick_size(&self, token_id: &TokenId) -> std::result::Result<Decimal, FetchOutcome>;
    async fn fetch_min_order_size(&self, token_id: &TokenId) -> std::result::Result<Decimal, FetchOutcome>;
}

#[derive(Default)]
pub struct NullMetadataSource;

#[async_trait]
impl MetadataSource for NullMetadataSource {
    async fn fetch_tick_size(&self, _token_id: &TokenId) -> std::result::Result<Decimal, FetchOutcome> {
        Ok(DEFAULT_TICK_SIZE)
    }

    async fn fetch_min_order_size(&self, _token_id: &TokenId) -> std::result::Result<Decimal, FetchOutcome> {
        Ok(DEFAULT_MIN_ORDER_SIZE)
    }
}

async fn with_retry<F, Fut>(op: F) -> Result<Decimal>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<Decimal, FetchOutcome>>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(FetchOutcome::Permanent) => {
                return Err(Error::Catalog("metadata fetch returned a non-retryable error".into()));
            }
            Err(FetchOutcome::Retryable) => {
                attempt += 1;
                if attempt > MAX_RETRIES {
                    return Err(Error::Catalog("metadata fetch exhausted retries".into()));
                }
                sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

/// Caches per-token tick size and minimum order size, plus a single
/// well-known slot for Discovery's known-market set (spec.md §4.1).
pub struct MetadataCache {
    entries: DashMap<TokenId, TokenMetadata>,
    source: Box<dyn MetadataSource>,
    known_markets: RwLock<Option<HashSet<MarketId>>>,
}

impl MetadataCache {
    #[must_use]
    pub fn new(source: impl MetadataSource + 'static) -> Self {
        Self { entries: DashMap::new(), source: Box::new(source), known_markets: RwLock::new(None) }
    }

    /// Persists Discovery's known-market set. Overwrites whatever was
    /// stored before.
    pub fn store_known_markets(&self, markets: HashSet<MarketId>) {
        *self.known_markets.write() = Some(markets);
    }

    /// Returns the persisted known-market set, or `None` if nothing has
    /// been stored yet (fresh cache — Discovery starts with an empty set
    /// and will re-emit everything it finds on the first tick).
    #[must_use]
    pub fn load_known_markets(&self) -> Option<HashSet<MarketId>> {
        self.known_markets.read().clone()
    }

    /// Returns cached metadata, refreshing it if absent or stale.
    ///
    /// A tick-size fetch failure propagates. A min-order-size fetch
    /// failure falls back to the conservative default so a transient
    /// sizing-endpoint outage never blocks detection.
    pub async fn get(&self, token_id: &TokenId) -> Result<TokenMetadata> {
        if let Some(entry) = self.entries.get(token_id) {
            if !entry.is_stale() {
                return Ok(entry.clone());
            }
        }

        let tick_size = with_retry(|| self.source.fetch_tick_size(token_id)).await?;
        let min_order_size = with_retry(|| self.source.fetch_min_order_size(token_id)).await.unwrap_or_else(|e| {
            warn!(token_id = %token_id, error = %e, "min order size fetch failed, using default");
            DEFAULT_MIN_ORDER_SIZE
        });

        let metadata = TokenMetadata { tick_size, min_order_size, fetched_at: Utc::now() };
        self.entries.insert(token_id.clone(), metadata.clone());
        Ok(metadata)
    }

    /// Updates the cached tick size in place, preserving the cached
    /// minimum order size and refreshing the fetch timestamp. A no-op
    /// if no entry exists yet (the next `get` will fetch fresh).
    pub async fn update_tick_size(&self, token_id: &TokenId, tick_size: Decimal) {
        if let Some(mut entry) = self.entries.get_mut(token_id) {
            entry.tick_size = tick_size;
            entry.fetched_at = Utc::now();
        }
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(NullMetadataSource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakySource {
        fail_times: AtomicU32,
        outcome_on_fail: FetchOutcome,
    }

    #[async_trait]
    impl MetadataSource for FlakySource {
        async fn fetch_tick_size(&self, _token_id: &TokenId) -> std::result::Result<Decimal, FetchOutcome> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(self.outcome_on_fail);
            }
            Ok(dec!(0.01))
        }

        async fn fetch_min_order_size(&self, _token_id: &TokenId) -> std::result::Result<Decimal, FetchOutcome> {
            Err(FetchOutcome::Retryable)
        }
    }

    #[tokio::test]
    async fn min_order_size_failure_falls_back_to_default() {
        let cache = MetadataCache::new(NullMetadataSource);
        let meta = cache.get(&TokenId::from("tok")).await.unwrap();
        assert_eq!(meta.min_order_size, DEFAULT_MIN_ORDER_SIZE);
    }

    #[tokio::test]
    async fn permanent_tick_size_error_propagates() {
        let source = FlakySource { fail_times: AtomicU32::new(1), outcome_on_fail: FetchOutcome::Permanent };
        let cache = MetadataCache::new(source);
        let result = cache.get(&TokenId::from("tok")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn retryable_tick_size_error_eventually_succeeds() {
        let source = FlakySource { fail_times: AtomicU32::new(2), outcome_on_fail: FetchOutcome::Retryable };
        let cache = MetadataCache::new(source);
        let result = cache.get(&TokenId::from("tok")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn update_tick_size_preserves_min_order_size() {
        let cache = MetadataCache::new(NullMetadataSource);
        let token = TokenId::from("tok");
        let before = cache.get(&token).await.unwrap();
        cache.update_tick_size(&token, dec!(0.001)).await;
        let after = cache.entries.get(&token).unwrap().clone();
        assert_eq!(after.tick_size, dec!(0.001));
        assert_eq!(after.min_order_size, before.min_order_size);
    }

    #[tokio::test]
    async fn update_tick_size_is_noop_when_absent() {
        let cache = MetadataCache::new(NullMetadataSource);
        cache.update_tick_size(&TokenId::from("absent"), dec!(0.001)).await;
        assert!(cache.entries.get(&TokenId::from("absent")).is_none());
    }
}
