//! Wires the six core components together and manages their lifecycle.
//!
//! Components never hold back-references to each other; all coupling is
//! through channels and `Arc`s passed in at construction, so shutdown
//! ordering is the wiring module's responsibility alone.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::config::Config;
use crate::core::breaker::{BalanceSource, CircuitBreaker};
use crate::core::detector::Detector;
use crate::core::discovery::Discovery;
use crate::core::domain::{Market, MarketId};
use crate::core::exchange::polymarket::{
    PolymarketCatalogClient, PolymarketOrderClient, PolymarketStream, PolymarketWalletFetcher,
};
use crate::core::exchange::{CatalogClient, OrderClient, OrderbookMessage, WalletFetcher};
use crate::core::executor::Executor;
use crate::core::metadata::MetadataCache;
use crate::core::orderbook::OrderbookManager;
use crate::core::store::{create_pool, ConsoleStore, Storage, SqliteStore};
use crate::error::Result;

const SHUTDOWN_CAP: Duration = Duration::from_secs(10);

fn build_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    match config.storage.mode {
        crate::config::StorageMode::Console => Ok(Arc::new(ConsoleStore::new())),
        crate::config::StorageMode::Sqlite => {
            let pool = create_pool(&config.storage.database_path)?;
            Ok(Arc::new(SqliteStore::new(pool)))
        }
    }
}

/// Markets known to the process, keyed by id. Discovery is the sole
/// writer; Detector and the stream-resubscribe task only read.
type MarketRegistry = Arc<DashMap<MarketId, Market>>;

/// Adapts the exchange-level [`WalletFetcher`] (address-keyed) to the
/// address-free [`BalanceSource`] the circuit breaker depends on.
struct WalletBalanceSource {
    wallet: Arc<dyn WalletFetcher>,
    address: String,
}

#[async_trait::async_trait]
impl BalanceSource for WalletBalanceSource {
    async fn balance(&self) -> Result<rust_decimal::Decimal> {
        self.wallet.get_balance(&self.address).await
    }
}

/// Owns every long-running component and the channels between them.
pub struct App {
    discovery: Arc<Discovery>,
    orderbook: Arc<OrderbookManager>,
    detector: Arc<Detector>,
    executor: Arc<Executor>,
    breaker: Arc<CircuitBreaker>,
    wallet: Arc<dyn WalletFetcher>,
    stream_url: String,
    wallet_address: String,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let catalog: Arc<dyn CatalogClient> =
            Arc::new(PolymarketCatalogClient::new(config.stream.catalog_url.clone()));

        let metadata = Arc::new(MetadataCache::default());
        let discovery = Arc::new(Discovery::new(catalog, config.discovery.to_discovery(), metadata.clone()));
        let orderbook = Arc::new(OrderbookManager::new(metadata.clone()));

        let storage = build_storage(&config)?;
        let detector = Arc::new(Detector::new(
            config.arb.to_detector(),
            orderbook.clone(),
            metadata,
            storage.clone(),
        ));

        let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.to_breaker()));
        let order_client: Option<Arc<dyn OrderClient>> = if config.execution.mode == crate::config::ExecutionMode::Live
        {
            Some(Arc::new(PolymarketOrderClient::new(config.stream.orders_url.clone())))
        } else {
            None
        };
        let executor = Arc::new(Executor::new(
            config.execution.to_executor(config.arb.fee),
            breaker.clone(),
            order_client,
            storage,
        ));

        let wallet: Arc<dyn WalletFetcher> = Arc::new(PolymarketWalletFetcher::new(config.stream.data_api_url.clone()));

        let (cancel_tx, cancel_rx) = watch::channel(false);

        Ok(Self {
            discovery,
            orderbook,
            detector,
            executor,
            breaker,
            wallet,
            stream_url: config.stream.ws_url.clone(),
            wallet_address: std::env::var("WALLET_ADDRESS").unwrap_or_default(),
            cancel_tx,
            cancel_rx,
        })
    }

    /// Drains Discovery's `NewMarkets` channel into the shared registry and
    /// republishes the flattened token-id list whenever it grows.
    async fn run_registry_task(
        registry: MarketRegistry,
        mut new_markets_rx: mpsc::Receiver<Market>,
        tokens_tx: watch::Sender<Vec<String>>,
        mut cancel_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                maybe_market = new_markets_rx.recv() => {
                    match maybe_market {
                        Some(market) => {
                            registry.insert(market.market_id().clone(), market);
                            let tokens: Vec<String> = registry
                                .iter()
                                .flat_map(|e| e.value().token_ids().into_iter().map(|t| t.as_str().to_string()).collect::<Vec<_>>())
                                .collect();
                            let _ = tokens_tx.send(tokens);
                        }
                        None => return,
                    }
                }
                _ = cancel_rx.changed() => {
                    if *cancel_rx.borrow() {
                        return;
                    }
                }
            }
        }
    }

    /// Reconnects the orderbook stream with the full subscription set
    /// whenever Discovery adds markets. A fresh connection is the
    /// simplest correct way to add subscriptions against a transport
    /// that only takes its asset list at connect time.
    async fn run_stream_task(
        url: String,
        mut tokens_rx: watch::Receiver<Vec<String>>,
        book_tx: mpsc::Sender<OrderbookMessage>,
        mut cancel_rx: watch::Receiver<bool>,
    ) {
        loop {
            let tokens = tokens_rx.borrow().clone();
            if tokens.is_empty() {
                tokio::select! {
                    _ = tokens_rx.changed() => continue,
                    _ = cancel_rx.changed() => {
                        if *cancel_rx.borrow() { return; }
                        continue;
                    }
                }
            }

            let stream = PolymarketStream::new(url.clone());
            let book_tx = book_tx.clone();
            tokio::select! {
                result = stream.run(tokens, book_tx) => {
                    if let Err(e) = result {
                        warn!(error = %e, "orderbook stream disconnected, reconnecting");
                    }
                }
                _ = tokens_rx.changed() => {}
                _ = cancel_rx.changed() => {
                    if *cancel_rx.borrow() { return; }
                }
            }
        }
    }

    /// Runs every component until `shutdown` resolves, then tears down in
    /// spec order: stop accepting new opportunities, drain the executor,
    /// stop the detector, close storage, stop the orderbook manager, stop
    /// the stream/discovery loop — capped at 10 seconds wall clock.
    pub async fn run(self, shutdown: impl std::future::Future<Output = ()>) -> Result<()> {
        let (new_markets_tx, new_markets_rx) = mpsc::channel::<Market>(256);
        let (book_tx, book_rx) = mpsc::channel::<OrderbookMessage>(4096);
        let (opp_tx, opp_rx) = mpsc::channel(256);
        let (tokens_tx, tokens_rx) = watch::channel(Vec::new());
        let (updates_tx, _updates_rx) = mpsc::channel(4096);

        let registry: MarketRegistry = Arc::new(DashMap::new());

        let mut tasks = Vec::new();

        tasks.push(tokio::spawn({
            let discovery = self.discovery.clone();
            let cancel_rx = self.cancel_rx.clone();
            async move { discovery.run(new_markets_tx, cancel_rx).await }
        }));

        tasks.push(tokio::spawn(Self::run_registry_task(
            registry.clone(),
            new_markets_rx,
            tokens_tx,
            self.cancel_rx.clone(),
        )));

        tasks.push(tokio::spawn(Self::run_stream_task(
            self.stream_url.clone(),
            tokens_rx,
            book_tx,
            self.cancel_rx.clone(),
        )));

        tasks.push(tokio::spawn({
            let orderbook = self.orderbook.clone();
            let cancel_rx = self.cancel_rx.clone();
            async move { orderbook.run(book_rx, updates_tx, cancel_rx).await }
        }));

        tasks.push(tokio::spawn({
            let breaker = self.breaker.clone();
            let balance_source = WalletBalanceSource { wallet: self.wallet.clone(), address: self.wallet_address.clone() };
            let cancel_rx = self.cancel_rx.clone();
            async move { breaker.run(&balance_source, cancel_rx).await }
        }));

        tasks.push(tokio::spawn({
            let detector = self.detector.clone();
            let cancel_rx = self.cancel_rx.clone();
            let registry = registry.clone();
            async move {
                detector
                    .run(move || registry.iter().map(|e| e.value().clone()).collect(), opp_tx, cancel_rx)
                    .await
            }
        }));

        tasks.push(tokio::spawn({
            let executor = self.executor.clone();
            let cancel_rx = self.cancel_rx.clone();
            async move { executor.run(opp_rx, cancel_rx).await }
        }));

        if self.wallet_address.is_empty() {
            warn!("WALLET_ADDRESS not set; circuit breaker balance checks will read an empty address");
        }

        shutdown.await;
        info!("shutdown signal received, tearing down");
        let _ = self.cancel_tx.send(true);

        let _ = tokio::time::timeout(SHUTDOWN_CAP, futures_util::future::join_all(tasks)).await;
        Ok(())
    }
}
