//! Market discovery loop (spec.md §4.1).
//!
//! Polls the catalog client on a fixed interval, paginating in batches
//! of at most 100, and emits markets not previously seen onto a bounded
//! channel. Catalog failures never fail the process: they're logged and
//! retried on the next tick.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::core::domain::{Market, MarketId, Outcome, TokenId};
use crate::core::exchange::{CatalogClient, CatalogMarket};
use crate::core::metadata::MetadataCache;
use crate::error::Result;

/// Maximum markets requested per catalog HTTP call.
const MAX_BATCH: usize = 100;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub poll_interval: Duration,
    /// Total markets to request per tick; 0 means "all".
    pub market_limit: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            market_limit: 0,
        }
    }
}

fn to_market(raw: CatalogMarket) -> Option<Market> {
    if raw.outcomes.len() < 2 || raw.clob_tokens.len() < 2 {
        return None;
    }
    let non_empty = raw.clob_tokens.iter().filter(|t| !t.is_empty()).count();
    if non_empty < 2 {
        return None;
    }

    let outcomes: Vec<Outcome> = raw
        .outcomes
        .iter()
        .zip(raw.clob_tokens.iter())
        .map(|(name, token_id)| Outcome::new(TokenId::from(token_id.as_str()), name.as_str()))
        .collect();

    let market = Market::new(MarketId::from(raw.id), raw.slug, raw.question, outcomes);
    market.is_tradeable().then_some(market)
}

/// Fetches pages of the catalog until `limit` markets have been seen or
/// a short page signals end-of-data. `limit == 0` fetches everything.
///
/// A failure on any page aborts the whole fetch; markets from
/// successful prior pages in this call are discarded (not emitted).
async fn fetch_all(client: &dyn CatalogClient, limit: usize) -> Result<Vec<CatalogMarket>> {
    let mut offset = 0usize;
    let mut out = Vec::new();

    loop {
        let remaining = if limit == 0 { MAX_BATCH } else { (limit - offset).min(MAX_BATCH) };
        if remaining == 0 {
            break;
        }

        let page = client.fetch_active_markets(remaining, offset).await?;
        let page_len = page.len();
        out.extend(page);
        offset += page_len;

        if page_len < remaining {
            break;
        }
        if limit != 0 && offset >= limit {
            break;
        }
    }

    Ok(out)
}

/// Maintains the set of live markets and emits newly-discovered ones.
pub struct Discovery {
    client: Arc<dyn CatalogClient>,
    config: DiscoveryConfig,
    known: RwLock<HashSet<MarketId>>,
    metadata: Arc<MetadataCache>,
}

impl Discovery {
    /// Seeds the known-market set from `metadata`'s persisted slot, if
    /// any — a restart with a warm cache does not re-emit markets it
    /// already saw (spec.md §4.1).
    #[must_use]
    pub fn new(client: Arc<dyn CatalogClient>, config: DiscoveryConfig, metadata: Arc<MetadataCache>) -> Self {
        let known = metadata.load_known_markets().unwrap_or_default();
        Self {
            client,
            config,
            known: RwLock::new(known),
            metadata,
        }
    }

    #[must_use]
    pub fn subscribed_markets(&self) -> Vec<MarketId> {
        self.known.read().iter().cloned().collect()
    }

    /// One discovery tick: fetch, filter, diff against known, emit
    /// newcomers. Emission is non-blocking and drops on a full channel —
    /// safe because the next tick recomputes the same set difference.
    async fn tick(&self, tx: &mpsc::Sender<Market>) {
        let raw = match fetch_all(self.client.as_ref(), self.config.market_limit).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "catalog fetch failed, retrying next tick");
                return;
            }
        };

        let candidates: Vec<Market> = raw.into_iter().filter_map(to_market).collect();

        let mut newcomers = Vec::new();
        {
            let known = self.known.read();
            for m in &candidates {
                if !known.contains(m.market_id()) {
                    newcomers.push(m.market_id().clone());
                }
            }
        }

        if newcomers.is_empty() {
            debug!(total = candidates.len(), "discovery tick: no new markets");
            return;
        }

        {
            let mut known = self.known.write();
            for id in &newcomers {
                known.insert(id.clone());
            }
            self.metadata.store_known_markets(known.clone());
        }

        for market in candidates {
            if newcomers.contains(market.market_id()) && tx.try_send(market).is_err() {
                warn!("NewMarkets channel full, dropping emission for this tick");
            }
        }

        info!(new_markets = newcomers.len(), "discovered new markets");
    }

    /// Runs the periodic discovery loop until `cancel` fires.
    pub async fn run(&self, tx: mpsc::Sender<Market>, mut cancel: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(&tx).await;
                }
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        info!("discovery loop shutting down");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeCatalog {
        pages: Mutex<Vec<Vec<CatalogMarket>>>,
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
    }

    #[async_trait]
    impl CatalogClient for FakeCatalog {
        async fn fetch_active_markets(&self, limit: usize, offset: usize) -> Result<Vec<CatalogMarket>> {
            let call_idx = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_call == Some(call_idx) {
                return Err(crate::error::Error::Catalog("boom".into()));
            }
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                return Ok(vec![]);
            }
            let page = pages.remove(0);
            assert!(page.len() <= limit, "page must respect batch limit");
            let _ = offset;
            Ok(page)
        }
    }

    fn market(id: &str, n_outcomes: usize) -> CatalogMarket {
        CatalogMarket {
            id: id.into(),
            slug: format!("{id}-slug"),
            question: "Q?".into(),
            active: true,
            closed: false,
            outcomes: (0..n_outcomes).map(|i| format!("outcome-{i}")).collect(),
            clob_tokens: (0..n_outcomes).map(|i| format!("{id}-tok-{i}")).collect(),
        }
    }

    #[test]
    fn to_market_rejects_single_outcome() {
        assert!(to_market(market("m1", 1)).is_none());
    }

    #[test]
    fn to_market_accepts_binary() {
        assert!(to_market(market("m1", 2)).is_some());
    }

    #[test]
    fn to_market_rejects_fewer_than_two_nonempty_token_ids() {
        let mut m = market("m1", 2);
        m.clob_tokens[1] = String::new();
        assert!(to_market(m).is_none());
    }

    #[tokio::test]
    async fn pagination_limit_250_issues_three_requests_100_100_50() {
        let pages = vec![
            (0..100).map(|i| market(&format!("a{i}"), 2)).collect::<Vec<_>>(),
            (0..100).map(|i| market(&format!("b{i}"), 2)).collect::<Vec<_>>(),
            (0..50).map(|i| market(&format!("c{i}"), 2)).collect::<Vec<_>>(),
        ];
        let client = FakeCatalog {
            pages: Mutex::new(pages),
            calls: AtomicUsize::new(0),
            fail_on_call: None,
        };

        let result = fetch_all(&client, 250).await.unwrap();
        assert_eq!(result.len(), 250);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn pagination_stops_early_on_short_page() {
        let pages = vec![(0..40).map(|i| market(&format!("a{i}"), 2)).collect::<Vec<_>>()];
        let client = FakeCatalog {
            pages: Mutex::new(pages),
            calls: AtomicUsize::new(0),
            fail_on_call: None,
        };

        let result = fetch_all(&client, 0).await.unwrap();
        assert_eq!(result.len(), 40);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn page_error_aborts_without_returning_prior_pages() {
        let pages = vec![
            (0..100).map(|i| market(&format!("a{i}"), 2)).collect::<Vec<_>>(),
            vec![],
        ];
        let client = FakeCatalog {
            pages: Mutex::new(pages),
            calls: AtomicUsize::new(0),
            fail_on_call: Some(1),
        };

        let result = fetch_all(&client, 250).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reemitting_known_market_does_not_duplicate() {
        let client = FakeCatalog {
            pages: Mutex::new(vec![vec![market("m1", 2)]]),
            calls: AtomicUsize::new(0),
            fail_on_call: None,
        };
        let discovery = Discovery::new(Arc::new(client), DiscoveryConfig::default(), Arc::new(MetadataCache::default()));
        let (tx, mut rx) = mpsc::channel(8);

        discovery.tick(&tx).await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        // Second tick re-fetches the empty remainder of pages, known set
        // already contains m1 so nothing new is emitted even if refetched.
        discovery.known.write().insert(MarketId::from("m1"));
        discovery.tick(&tx).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn known_markets_survive_restart_via_metadata_cache() {
        let client = FakeCatalog {
            pages: Mutex::new(vec![vec![market("m1", 2)]]),
            calls: AtomicUsize::new(0),
            fail_on_call: None,
        };
        let metadata = Arc::new(MetadataCache::default());
        let discovery = Discovery::new(Arc::new(client), DiscoveryConfig::default(), metadata.clone());
        let (tx, mut rx) = mpsc::channel(8);
        discovery.tick(&tx).await;
        assert!(rx.try_recv().is_ok());

        // A fresh Discovery sharing the same metadata cache seeds its
        // known set from it and does not re-emit m1.
        let client2 = FakeCatalog {
            pages: Mutex::new(vec![vec![market("m1", 2)]]),
            calls: AtomicUsize::new(0),
            fail_on_call: None,
        };
        let restarted = Discovery::new(Arc::new(client2), DiscoveryConfig::default(), metadata);
        restarted.tick(&tx).await;
        assert!(rx.try_recv().is_err());
    }
}
