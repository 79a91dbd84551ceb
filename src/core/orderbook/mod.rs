//! Best bid/ask state tracking (spec.md §4.2).
//!
//! A single consumer task drains `OrderbookMessage`s off an inbound
//! channel and mutates a concurrent snapshot map. Readers (the
//! Detector) go through `get_snapshot`/`all_snapshots`, which return
//! owned copies so the lock is never held across an await. Every
//! successful mutation is also forwarded on an outbound `Updates`
//! channel; that channel is non-blocking and drops the update on
//! backpressure, since a reader that falls behind can always recover
//! its current state via `get_snapshot`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tracing::{error, warn};

use crate::core::domain::{MarketId, Snapshot, TokenId};
use crate::core::exchange::{OrderbookMessage, RawLevel};
use crate::core::metadata::MetadataCache;
use crate::error::{Error, Result};

fn parse_level(l: &RawLevel) -> Result<(Decimal, Decimal)> {
    let price: Decimal = l
        .price
        .parse()
        .map_err(|_| Error::InvalidLevel(format!("bad price {:?}", l.price)))?;
    let size: Decimal = l
        .size
        .parse()
        .map_err(|_| Error::InvalidLevel(format!("bad size {:?}", l.size)))?;
    Ok((price, size))
}

/// Highest-priced level, or an error if any level in `levels` fails to
/// parse. A parse failure must abort the whole update, so this never
/// silently skips a bad entry and returns the rest.
fn best_level(levels: &[RawLevel]) -> Result<Option<(Decimal, Decimal)>> {
    let mut best: Option<(Decimal, Decimal)> = None;
    for l in levels {
        let (price, size) = parse_level(l)?;
        if best.map_or(true, |(best_price, _)| price > best_price) {
            best = Some((price, size));
        }
    }
    Ok(best)
}

/// Lowest-priced level, or an error if any level in `levels` fails to
/// parse.
fn best_level_min(levels: &[RawLevel]) -> Result<Option<(Decimal, Decimal)>> {
    let mut best: Option<(Decimal, Decimal)> = None;
    for l in levels {
        let (price, size) = parse_level(l)?;
        if best.map_or(true, |(best_price, _)| price < best_price) {
            best = Some((price, size));
        }
    }
    Ok(best)
}

/// Tracks the best bid/ask per token from a live market-data stream.
pub struct OrderbookManager {
    snapshots: DashMap<TokenId, Snapshot>,
    heartbeats: AtomicU64,
    sequence: AtomicU64,
    dropped_updates: AtomicU64,
    metadata: Arc<MetadataCache>,
}

impl OrderbookManager {
    #[must_use]
    pub fn new(metadata: Arc<MetadataCache>) -> Self {
        Self {
            snapshots: DashMap::new(),
            heartbeats: AtomicU64::new(0),
            sequence: AtomicU64::new(0),
            dropped_updates: AtomicU64::new(0),
            metadata,
        }
    }

    #[must_use]
    pub fn get_snapshot(&self, token_id: &TokenId) -> Option<Snapshot> {
        self.snapshots.get(token_id).map(|s| s.clone())
    }

    #[must_use]
    pub fn all_snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.iter().map(|e| e.value().clone()).collect()
    }

    #[must_use]
    pub fn heartbeat_count(&self) -> u64 {
        self.heartbeats.load(Ordering::Relaxed)
    }

    /// Count of `Updates` emissions dropped because the channel was full.
    #[must_use]
    pub fn dropped_update_count(&self) -> u64 {
        self.dropped_updates.load(Ordering::Relaxed)
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn publish(&self, tx: Option<&mpsc::Sender<Snapshot>>, snapshot: Snapshot) {
        let Some(tx) = tx else { return };
        if tx.try_send(snapshot).is_err() {
            self.dropped_updates.fetch_add(1, Ordering::Relaxed);
            warn!("Updates channel full, dropping orderbook update");
        }
    }

    /// Replaces the full book for `token_id`. Rejects (without mutating
    /// state) if either side is empty or any level fails to parse.
    fn apply_book(
        &self,
        token_id: TokenId,
        market_id: &str,
        bids: &[RawLevel],
        asks: &[RawLevel],
    ) -> Option<Snapshot> {
        if bids.is_empty() || asks.is_empty() {
            warn!(token_id = %token_id, "rejecting book message with no levels");
            return None;
        }
        let bid = match best_level(bids) {
            Ok(b) => b,
            Err(e) => {
                warn!(token_id = %token_id, error = %e, "rejecting book message with unparseable bid level");
                return None;
            }
        };
        let ask = match best_level_min(asks) {
            Ok(a) => a,
            Err(e) => {
                warn!(token_id = %token_id, error = %e, "rejecting book message with unparseable ask level");
                return None;
            }
        };

        let seq = self.next_sequence();
        let mut snapshot = Snapshot::new(token_id.clone(), MarketId::from(market_id), seq);
        if let Some((price, size)) = bid {
            snapshot.set_bid(price, size);
        }
        if let Some((price, size)) = ask {
            snapshot.set_ask(price, size);
        }
        self.snapshots.insert(token_id, snapshot.clone());
        Some(snapshot)
    }

    /// Applies an incremental update. A size-zero level updates the
    /// stored price only, keeping the previously recorded size in
    /// place (spec.md §4.2). Any level parse failure aborts the whole
    /// update without mutating state.
    fn apply_price_change(
        &self,
        token_id: TokenId,
        market_id: &str,
        bids: &[RawLevel],
        asks: &[RawLevel],
    ) -> Option<Snapshot> {
        if !self.snapshots.contains_key(&token_id) {
            return self.apply_book(token_id, market_id, bids, asks);
        }

        let bid = match best_level(bids) {
            Ok(b) => b,
            Err(e) => {
                warn!(token_id = %token_id, error = %e, "rejecting price_change with unparseable bid level");
                return None;
            }
        };
        let ask = match best_level_min(asks) {
            Ok(a) => a,
            Err(e) => {
                warn!(token_id = %token_id, error = %e, "rejecting price_change with unparseable ask level");
                return None;
            }
        };

        let seq = self.next_sequence();
        let mut entry = self.snapshots.get_mut(&token_id).unwrap();
        entry.set_sequence(seq);

        if let Some((price, size)) = bid {
            if size <= Decimal::ZERO {
                entry.set_bid_price(price);
            } else {
                entry.set_bid(price, size);
            }
        }
        if let Some((price, size)) = ask {
            if size <= Decimal::ZERO {
                entry.set_ask_price(price);
            } else {
                entry.set_ask(price, size);
            }
        }
        Some(entry.clone())
    }

    pub(crate) async fn handle(&self, msg: OrderbookMessage, tx: Option<&mpsc::Sender<Snapshot>>) {
        match msg {
            OrderbookMessage::Book { asset_id, market_id, bids, asks } => {
                if let Some(snapshot) = self.apply_book(TokenId::from(asset_id), &market_id, &bids, &asks) {
                    self.publish(tx, snapshot);
                }
            }
            OrderbookMessage::PriceChange { asset_id, market_id, bids, asks } => {
                if let Some(snapshot) = self.apply_price_change(TokenId::from(asset_id), &market_id, &bids, &asks) {
                    self.publish(tx, snapshot);
                }
            }
            OrderbookMessage::TickSizeChange { asset_id, tick_size } => {
                self.metadata.update_tick_size(&TokenId::from(asset_id), tick_size).await;
            }
            OrderbookMessage::Heartbeat => {
                self.heartbeats.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Runs the consumer loop until the channel closes or `cancel`
    /// fires. `updates` carries every successful mutation out to
    /// subscribers; it is dropped-on-full, never blocking.
    pub async fn run(
        &self,
        mut rx: mpsc::Receiver<OrderbookMessage>,
        updates: mpsc::Sender<Snapshot>,
        mut cancel: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(msg) => self.handle(msg, Some(&updates)).await,
                        None => {
                            error!("orderbook inbound channel closed");
                            return;
                        }
                    }
                }
                _ = cancel.changed() => {
                    if *cancel.borrow() {
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
    use rust_decimal_macros::dec;

    fn level(price: &str, size: &str) -> RawLevel {
        RawLevel { price: price.into(), size: size.into() }
    }

    fn manager() -> OrderbookManager {
        OrderbookManager::new(Arc::new(MetadataCache::default()))
    }

    #[tokio::test]
    async fn book_message_sets_best_bid_and_ask() {
        let mgr = manager();
        mgr.handle(
            OrderbookMessage::Book {
                asset_id: "tok-1".into(),
                market_id: "m1".into(),
                bids: vec![level("0.40", "100"), level("0.38", "50")],
                asks: vec![level("0.45", "100"), level("0.47", "20")],
            },
            None,
        )
        .await;

        let snap = mgr.get_snapshot(&TokenId::from("tok-1")).unwrap();
        assert_eq!(snap.best_bid_price(), Some(dec!(0.40)));
        assert_eq!(snap.best_ask_price(), Some(dec!(0.45)));
    }

    #[tokio::test]
    async fn book_message_with_no_levels_is_rejected() {
        let mgr = manager();
        mgr.handle(
            OrderbookMessage::Book {
                asset_id: "tok-1".into(),
                market_id: "m1".into(),
                bids: vec![],
                asks: vec![],
            },
            None,
        )
        .await;
        assert!(mgr.get_snapshot(&TokenId::from("tok-1")).is_none());
    }

    #[tokio::test]
    async fn book_message_with_one_empty_side_is_rejected() {
        let mgr = manager();
        mgr.handle(
            OrderbookMessage::Book {
                asset_id: "tok-1".into(),
                market_id: "m1".into(),
                bids: vec![level("0.40", "100")],
                asks: vec![],
            },
            None,
        )
        .await;
        assert!(mgr.get_snapshot(&TokenId::from("tok-1")).is_none());
    }

    #[tokio::test]
    async fn price_change_with_zero_size_keeps_prior_size_and_updates_price() {
        let mgr = manager();
        mgr.handle(
            OrderbookMessage::Book {
                asset_id: "tok-1".into(),
                market_id: "m1".into(),
                bids: vec![level("0.40", "100")],
                asks: vec![level("0.45", "100")],
            },
            None,
        )
        .await;
        mgr.handle(
            OrderbookMessage::PriceChange {
                asset_id: "tok-1".into(),
                market_id: "m1".into(),
                bids: vec![level("0.41", "0")],
                asks: vec![],
            },
            None,
        )
        .await;

        let snap = mgr.get_snapshot(&TokenId::from("tok-1")).unwrap();
        assert_eq!(snap.best_bid_price(), Some(dec!(0.41)));
        assert_eq!(snap.best_bid_size(), Some(dec!(100)));
        // empty asks array: no change
        assert_eq!(snap.best_ask_price(), Some(dec!(0.45)));
    }

    #[tokio::test]
    async fn price_change_without_prior_snapshot_falls_back_to_book() {
        let mgr = manager();
        mgr.handle(
            OrderbookMessage::PriceChange {
                asset_id: "tok-1".into(),
                market_id: "m1".into(),
                bids: vec![level("0.40", "100")],
                asks: vec![level("0.45", "100")],
            },
            None,
        )
        .await;

        let snap = mgr.get_snapshot(&TokenId::from("tok-1")).unwrap();
        assert_eq!(snap.best_bid_price(), Some(dec!(0.40)));
    }

    #[tokio::test]
    async fn unparseable_level_aborts_update_without_mutating_state() {
        let mgr = manager();
        mgr.handle(
            OrderbookMessage::Book {
                asset_id: "tok-1".into(),
                market_id: "m1".into(),
                bids: vec![level("0.40", "100")],
                asks: vec![level("0.45", "100")],
            },
            None,
        )
        .await;
        mgr.handle(
            OrderbookMessage::PriceChange {
                asset_id: "tok-1".into(),
                market_id: "m1".into(),
                bids: vec![level("not-a-number", "100")],
                asks: vec![],
            },
            None,
        )
        .await;

        let snap = mgr.get_snapshot(&TokenId::from("tok-1")).unwrap();
        assert_eq!(snap.best_bid_price(), Some(dec!(0.40)));
        assert_eq!(snap.sequence(), 0);
    }

    #[tokio::test]
    async fn heartbeat_increments_counter_without_touching_snapshots() {
        let mgr = manager();
        mgr.handle(OrderbookMessage::Heartbeat, None).await;
        mgr.handle(OrderbookMessage::Heartbeat, None).await;
        assert_eq!(mgr.heartbeat_count(), 2);
        assert!(mgr.all_snapshots().is_empty());
    }

    #[tokio::test]
    async fn successful_mutation_publishes_to_updates_channel() {
        let mgr = manager();
        let (tx, mut rx) = mpsc::channel(8);
        mgr.handle(
            OrderbookMessage::Book {
                asset_id: "tok-1".into(),
                market_id: "m1".into(),
                bids: vec![level("0.40", "100")],
                asks: vec![level("0.45", "100")],
            },
            Some(&tx),
        )
        .await;

        let snap = rx.try_recv().unwrap();
        assert_eq!(snap.token_id(), &TokenId::from("tok-1"));
    }

    #[tokio::test]
    async fn full_updates_channel_drops_and_counts() {
        let mgr = manager();
        let (tx, _rx) = mpsc::channel(1);
        for i in 0..3 {
            mgr.handle(
                OrderbookMessage::Book {
                    asset_id: format!("tok-{i}"),
                    market_id: "m1".into(),
                    bids: vec![level("0.40", "100")],
                    asks: vec![level("0.45", "100")],
                },
                Some(&tx),
            )
            .await;
        }
        assert!(mgr.dropped_update_count() > 0);
    }
}
