//! Abstract collaborator interfaces the core pipeline consumes.
//!
//! Each trait here corresponds to an external system spec.md treats as
//! out of scope for the Core: the REST market catalog, the orderbook
//! streaming transport, the venue's order-placement API, and on-chain
//! wallet balance access. `polymarket` provides one concrete
//! implementation of each against the Polymarket CLOB/data APIs.

pub mod polymarket;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::core::domain::TokenId;
use crate::error::Result;

/// A market as reported by the upstream catalog, before filtering.
#[derive(Debug, Clone)]
pub struct CatalogMarket {
    pub id: String,
    pub slug: String,
    pub question: String,
    pub active: bool,
    pub closed: bool,
    pub outcomes: Vec<String>,
    pub clob_tokens: Vec<String>,
}

/// Fetches pages of the active market catalog.
///
/// Implementations perform exactly one HTTP request per call; paging
/// across requests is Discovery's responsibility (see
/// [`crate::core::discovery::Discovery`]).
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn fetch_active_markets(&self, limit: usize, offset: usize) -> Result<Vec<CatalogMarket>>;
}

/// Best-first price level as received from the stream transport, before
/// decimal parsing.
#[derive(Debug, Clone)]
pub struct RawLevel {
    pub price: String,
    pub size: String,
}

/// A parsed message from the orderbook streaming transport.
#[derive(Debug, Clone)]
pub enum OrderbookMessage {
    Book {
        asset_id: String,
        market_id: String,
        bids: Vec<RawLevel>,
        asks: Vec<RawLevel>,
    },
    PriceChange {
        asset_id: String,
        market_id: String,
        bids: Vec<RawLevel>,
        asks: Vec<RawLevel>,
    },
    TickSizeChange {
        asset_id: String,
        tick_size: Decimal,
    },
    Heartbeat,
}

/// Side of an order being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// One leg to submit to the order-placement API.
#[derive(Debug, Clone)]
pub struct OrderLeg {
    pub token_id: TokenId,
    pub side: OrderSide,
    pub price: Decimal,
    pub size: Decimal,
}

/// Per-leg submission status reported by `/orders`.
#[derive(Debug, Clone)]
pub struct OrderResponse {
    pub success: bool,
    pub order_id: Option<String>,
    pub status: String,
    pub error_msg: Option<String>,
}

/// Fill state for a previously submitted order.
#[derive(Debug, Clone)]
pub struct FillStatus {
    pub filled_size: Decimal,
}

/// Submits batched multi-leg orders and polls fill state.
#[async_trait]
pub trait OrderClient: Send + Sync {
    async fn place_orders(&self, legs: &[OrderLeg]) -> Result<Vec<OrderResponse>>;
    async fn get_fill(&self, order_id: &str) -> Result<FillStatus>;
}

/// Reads the trading wallet's balance for the circuit breaker.
#[async_trait]
pub trait WalletFetcher: Send + Sync {
    /// Returns the USDC balance in decimal units (not fixed-point).
    async fn get_balance(&self, address: &str) -> Result<Decimal>;
}
