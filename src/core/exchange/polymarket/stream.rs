//! Polymarket market-data WebSocket subscriber.
//!
//! Connects, subscribes to the given asset ids, and forwards parsed
//! [`OrderbookMessage`]s onto a channel for `OrderbookManager` to
//! consume. Reconnection/backoff is this adapter's concern, not the
//! Core's: a dropped connection here simply stops new messages from
//! arriving until the caller reconnects.

use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::messages::{SubscribeMessage, WsMessage, WsPriceLevel};
use crate::core::exchange::{OrderbookMessage, RawLevel};
use crate::error::Result;

/// Streams orderbook messages for a fixed set of asset ids over one
/// WebSocket connection.
pub struct PolymarketStream {
    url: String,
}

impl PolymarketStream {
    #[must_use]
    pub const fn new(url: String) -> Self {
        Self { url }
    }

    /// Connects, subscribes, and forwards messages onto `tx` until the
    /// connection closes or errors. Returns so the caller can decide
    /// whether/when to reconnect.
    pub async fn run(&self, asset_ids: Vec<String>, tx: mpsc::Sender<OrderbookMessage>) -> Result<()> {
        info!(url = %self.url, assets = asset_ids.len(), "connecting to orderbook stream");
        let (mut ws, _resp) = connect_async(&self.url).await?;

        let sub = SubscribeMessage::new(asset_ids);
        let payload = serde_json::to_string(&sub)?;
        ws.send(Message::Text(payload)).await?;

        while let Some(frame) = ws.next().await {
            let frame = frame?;
            let text = match frame {
                Message::Text(t) => t,
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => {
                    info!("orderbook stream closed by server");
                    break;
                }
                _ => continue,
            };

            let parsed: Vec<WsMessage> = match serde_json::from_str::<Vec<WsMessage>>(&text) {
                Ok(v) => v,
                Err(_) => match serde_json::from_str::<WsMessage>(&text) {
                    Ok(m) => vec![m],
                    Err(e) => {
                        warn!(error = %e, "failed to parse stream message");
                        continue;
                    }
                },
            };

            for msg in parsed {
                if let Some(converted) = convert(msg) {
                    if tx.send(converted).await.is_err() {
                        debug!("orderbook message channel closed, stopping stream");
                        return Ok(());
                    }
                }
            }
        }

        Ok(())
    }
}

fn levels(raw: Vec<WsPriceLevel>) -> Vec<RawLevel> {
    raw.into_iter()
        .map(|l| RawLevel {
            price: l.price,
            size: l.size,
        })
        .collect()
}

fn convert(msg: WsMessage) -> Option<OrderbookMessage> {
    match msg {
        WsMessage::Book(b) => Some(OrderbookMessage::Book {
            asset_id: b.asset_id,
            market_id: b.market,
            bids: levels(b.bids),
            asks: levels(b.asks),
        }),
        WsMessage::PriceChange(p) => Some(OrderbookMessage::PriceChange {
            asset_id: p.asset_id,
            market_id: p.market,
            bids: levels(p.bids),
            asks: levels(p.asks),
        }),
        WsMessage::TickSizeChange(t) => {
            let tick_size: Decimal = t.new_tick_size.parse().ok()?;
            Some(OrderbookMessage::TickSizeChange {
                asset_id: t.asset_id,
                tick_size,
            })
        }
        WsMessage::Heartbeat => Some(OrderbookMessage::Heartbeat),
        WsMessage::Unknown => {
            error!("unrecognized stream message kind");
            None
        }
    }
}
