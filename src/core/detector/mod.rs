//! Periodic profitability scan (spec.md §4.4).
//!
//! For an N-outcome market with ask prices `p_1..p_n` and a fee rate
//! `f`, an arbitrage exists when `Σp_i·(1+f) < θ`. `profit_bps` is the
//! rounded basis-point margin implied by that inequality.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::core::domain::{Market, MarketId, Opportunity, OpportunityLeg};
use crate::core::metadata::MetadataCache;
use crate::core::orderbook::OrderbookManager;
use crate::core::store::Storage;

#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    pub scan_interval: Duration,
    pub fee: Decimal,
    pub profit_threshold: Decimal,
    pub max_trade_size: Decimal,
    pub min_trade_size: Decimal,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(250),
            fee: Decimal::ZERO,
            profit_threshold: Decimal::ONE,
            max_trade_size: Decimal::from(1000),
            min_trade_size: Decimal::from(1),
        }
    }
}

fn round_bps(margin: Decimal) -> i64 {
    (margin * Decimal::from(10_000)).round().to_i64().unwrap_or(0)
}

fn opportunity_id(market_id: &MarketId, token_ids: &[String], timestamp_bucket: i64) -> String {
    let mut sorted = token_ids.to_vec();
    sorted.sort();
    let mut hasher = DefaultHasher::new();
    market_id.as_str().hash(&mut hasher);
    sorted.hash(&mut hasher);
    timestamp_bucket.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

struct Leg {
    token_id: String,
    outcome_name: String,
    ask_price: Decimal,
    ask_size: Decimal,
    tick_size: Decimal,
    min_order_size: Decimal,
}

/// Scans subscribed markets for cross-outcome mispricing and emits
/// sizeable opportunities.
pub struct Detector {
    config: DetectorConfig,
    orderbook: Arc<OrderbookManager>,
    metadata: Arc<MetadataCache>,
    storage: Arc<dyn Storage>,
    dropped: std::sync::atomic::AtomicU64,
}

impl Detector {
    #[must_use]
    pub fn new(
        config: DetectorConfig,
        orderbook: Arc<OrderbookManager>,
        metadata: Arc<MetadataCache>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self { config, orderbook, metadata, storage, dropped: std::sync::atomic::AtomicU64::new(0) }
    }

    async fn legs_for(&self, market: &Market) -> Option<Vec<Leg>> {
        let mut legs = Vec::with_capacity(market.outcomes().len());
        for outcome in market.outcomes() {
            let snapshot = self.orderbook.get_snapshot(outcome.token_id())?;
            if !snapshot.has_valid_ask() {
                return None;
            }
            let meta = self.metadata.get(outcome.token_id()).await.ok()?;
            legs.push(Leg {
                token_id: outcome.token_id().as_str().to_string(),
                outcome_name: outcome.name().to_string(),
                ask_price: snapshot.best_ask_price().unwrap(),
                ask_size: snapshot.best_ask_size().unwrap_or(Decimal::ZERO),
                tick_size: meta.tick_size,
                min_order_size: meta.min_order_size,
            });
        }
        Some(legs)
    }

    /// Computes the sized opportunity for one market, or `None` if no
    /// profitable, adequately-sized trade exists right now.
    fn evaluate(&self, market: &Market, legs: &[Leg]) -> Option<Opportunity> {
        let price_sum: Decimal = legs.iter().map(|l| l.ask_price).sum();
        let effective = price_sum * (Decimal::ONE + self.config.fee);
        if effective >= self.config.profit_threshold {
            return None;
        }

        let min_size = legs.iter().map(|l| l.ask_size).fold(Decimal::MAX, Decimal::min);
        let max_price = legs.iter().map(|l| l.ask_price).fold(Decimal::ZERO, Decimal::max);
        let budget_size = if max_price > Decimal::ZERO { self.config.max_trade_size / max_price } else { Decimal::ZERO };
        let coarsest_min = legs.iter().map(|l| l.min_order_size).fold(Decimal::ZERO, Decimal::max);

        let mut trade_size = min_size.min(budget_size);
        if coarsest_min > Decimal::ZERO {
            trade_size = (trade_size / coarsest_min).floor() * coarsest_min;
        } else {
            trade_size = trade_size.floor();
        }

        if trade_size < coarsest_min || trade_size < self.config.min_trade_size {
            return None;
        }

        let profit_margin = Decimal::ONE - effective;
        let profit_bps = round_bps(profit_margin);

        let opp_legs: Vec<OpportunityLeg> = legs
            .iter()
            .map(|l| {
                OpportunityLeg::new(
                    l.token_id.clone().into(),
                    l.outcome_name.clone(),
                    l.ask_price,
                    l.ask_size,
                    l.tick_size,
                    l.min_order_size,
                )
            })
            .collect();

        let timestamp_bucket = Utc::now().timestamp() / self.config.scan_interval.as_secs().max(1) as i64;
        let token_ids: Vec<String> = legs.iter().map(|l| l.token_id.clone()).collect();
        let id = opportunity_id(market.market_id(), &token_ids, timestamp_bucket);

        Some(Opportunity::new(
            id,
            market.market_id().clone(),
            market.slug(),
            market.question(),
            opp_legs,
            trade_size,
            price_sum,
            profit_margin,
            profit_bps,
        ))
    }

    async fn scan(&self, markets: &[Market], tx: &mpsc::Sender<Opportunity>) {
        for market in markets {
            let Some(legs) = self.legs_for(market).await else { continue };
            let Some(opportunity) = self.evaluate(market, &legs) else { continue };

            debug!(market_id = %market.market_id(), profit_bps = opportunity.profit_bps(), "opportunity detected");

            if let Err(e) = self.storage.store_opportunity(&opportunity).await {
                warn!(error = %e, "failed to persist opportunity");
            }

            if tx.try_send(opportunity).is_err() {
                self.dropped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                warn!("Opportunities channel full, dropping detected opportunity");
            }
        }
    }

    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Runs the periodic scan loop over `markets` until `cancel` fires.
    /// `markets` is re-read each tick so newly discovered markets are
    /// picked up without restarting the loop.
    pub async fn run(
        &self,
        markets: impl Fn() -> Vec<Market> + Send + Sync,
        tx: mpsc::Sender<Opportunity>,
        mut cancel: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(self.config.scan_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.scan(&markets(), &tx).await;
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
    use crate::core::domain::{MarketId, Outcome, TokenId};
    use crate::core::metadata::{MetadataCache, NullMetadataSource};
    use crate::core::orderbook::OrderbookManager;
    use crate::core::store::ConsoleStore;
    use rust_decimal_macros::dec;

    fn detector(config: DetectorConfig) -> (Detector, Arc<OrderbookManager>) {
        let metadata = Arc::new(MetadataCache::new(NullMetadataSource));
        let orderbook = Arc::new(OrderbookManager::new(metadata.clone()));
        let storage = Arc::new(ConsoleStore::new());
        (Detector::new(config, orderbook.clone(), metadata, storage), orderbook)
    }

    fn binary_market() -> Market {
        Market::new(
            MarketId::from("m1"),
            "will-it-rain",
            "Will it rain?",
            vec![
                Outcome::new(TokenId::from("yes"), "Yes"),
                Outcome::new(TokenId::from("no"), "No"),
            ],
        )
    }

    async fn seed_ask(orderbook: &OrderbookManager, token: &str, price: Decimal, size: Decimal) {
        use crate::core::exchange::{OrderbookMessage, RawLevel};
        orderbook
            .handle(
                OrderbookMessage::Book {
                    asset_id: token.into(),
                    market_id: "m1".into(),
                    bids: vec![RawLevel { price: "0.01".into(), size: "10".into() }],
                    asks: vec![RawLevel { price: price.to_string(), size: size.to_string() }],
                },
                None,
            )
            .await;
    }

    #[tokio::test]
    async fn binary_market_yes_048_no_050_fee_001_threshold_0995_yields_102_bps() {
        let config = DetectorConfig {
            fee: dec!(0.01),
            profit_threshold: dec!(0.995),
            max_trade_size: dec!(1000),
            min_trade_size: dec!(1),
            ..DetectorConfig::default()
        };
        let (detector, orderbook) = detector(config);
        seed_ask(&orderbook, "yes", dec!(0.48), dec!(100)).await;
        seed_ask(&orderbook, "no", dec!(0.50), dec!(100)).await;

        let market = binary_market();
        let legs = detector.legs_for(&market).await.unwrap();
        let opp = detector.evaluate(&market, &legs).unwrap();
        assert_eq!(opp.profit_bps(), 102);
    }

    #[tokio::test]
    async fn price_sum_at_or_above_threshold_yields_no_opportunity() {
        let config = DetectorConfig { fee: dec!(0), profit_threshold: dec!(1), ..DetectorConfig::default() };
        let (detector, orderbook) = detector(config);
        seed_ask(&orderbook, "yes", dec!(0.50), dec!(100)).await;
        seed_ask(&orderbook, "no", dec!(0.50), dec!(100)).await;

        let market = binary_market();
        let legs = detector.legs_for(&market).await.unwrap();
        assert!(detector.evaluate(&market, &legs).is_none());
    }

    #[tokio::test]
    async fn missing_snapshot_for_an_outcome_skips_market() {
        let config = DetectorConfig::default();
        let (detector, orderbook) = detector(config);
        seed_ask(&orderbook, "yes", dec!(0.40), dec!(100)).await;

        let market = binary_market();
        assert!(detector.legs_for(&market).await.is_none());
    }

    fn n_way_market(n: usize) -> Market {
        let outcomes = (0..n)
            .map(|i| Outcome::new(TokenId::from(format!("tok-{i}")), format!("Outcome {i}")))
            .collect();
        Market::new(MarketId::from("m1"), "n-way-slug", "N-way market?", outcomes)
    }

    #[tokio::test]
    async fn three_way_market_asks_030_0315_033_fee_001_threshold_0995_yields_opportunity() {
        let config = DetectorConfig {
            fee: dec!(0.01),
            profit_threshold: dec!(0.995),
            max_trade_size: dec!(1000),
            min_trade_size: dec!(1),
            ..DetectorConfig::default()
        };
        let (detector, orderbook) = detector(config);
        seed_ask(&orderbook, "tok-0", dec!(0.30), dec!(100)).await;
        seed_ask(&orderbook, "tok-1", dec!(0.315), dec!(100)).await;
        seed_ask(&orderbook, "tok-2", dec!(0.330), dec!(100)).await;

        let market = n_way_market(3);
        let legs = detector.legs_for(&market).await.unwrap();
        assert_eq!(legs.len(), 3);
        let opp = detector.evaluate(&market, &legs).unwrap();
        assert_eq!(opp.legs().len(), 3);
        // sum=0.945, 0.945*1.01=0.95445, margin=0.04555 -> 456 bps
        assert_eq!(opp.profit_bps(), 456);
    }

    #[tokio::test]
    async fn ten_way_market_all_asks_008_fee_001_yields_opportunity() {
        let config = DetectorConfig {
            fee: dec!(0.01),
            profit_threshold: dec!(0.995),
            max_trade_size: dec!(1000),
            min_trade_size: dec!(1),
            ..DetectorConfig::default()
        };
        let (detector, orderbook) = detector(config);
        for i in 0..10 {
            seed_ask(&orderbook, &format!("tok-{i}"), dec!(0.08), dec!(100)).await;
        }

        let market = n_way_market(10);
        let legs = detector.legs_for(&market).await.unwrap();
        assert_eq!(legs.len(), 10);
        let opp = detector.evaluate(&market, &legs).unwrap();
        assert_eq!(opp.legs().len(), 10);
        // sum=0.80, 0.80*1.01=0.808, margin=0.192 -> 1920 bps
        assert_eq!(opp.profit_bps(), 1920);
    }

    #[tokio::test]
    async fn trade_size_below_min_trade_size_is_rejected() {
        let config = DetectorConfig {
            fee: dec!(0),
            profit_threshold: dec!(1),
            max_trade_size: dec!(1000),
            min_trade_size: dec!(500),
            ..DetectorConfig::default()
        };
        let (detector, orderbook) = detector(config);
        seed_ask(&orderbook, "yes", dec!(0.40), dec!(10)).await;
        seed_ask(&orderbook, "no", dec!(0.40), dec!(10)).await;

        let market = binary_market();
        let legs = detector.legs_for(&market).await.unwrap();
        assert!(detector.evaluate(&market, &legs).is_none());
    }
}
