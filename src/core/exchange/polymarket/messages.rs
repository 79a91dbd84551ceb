//! Wire message shapes for the Polymarket market-data WebSocket.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct SubscribeMessage {
    pub assets_ids: Vec<String>,
    #[serde(rename = "type")]
    pub msg_type: String,
}

impl SubscribeMessage {
    #[must_use]
    pub fn new(asset_ids: Vec<String>) -> Self {
        Self {
            assets_ids: asset_ids,
            msg_type: "market".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event_type")]
pub enum WsMessage {
    #[serde(rename = "book")]
    Book(BookMessage),
    #[serde(rename = "price_change")]
    PriceChange(PriceChangeMessage),
    #[serde(rename = "tick_size_change")]
    TickSizeChange(TickSizeChangeMessage),
    #[serde(rename = "heartbeat")]
    Heartbeat,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct BookMessage {
    pub asset_id: String,
    #[serde(default)]
    pub market: String,
    pub bids: Vec<WsPriceLevel>,
    pub asks: Vec<WsPriceLevel>,
}

#[derive(Debug, Deserialize)]
pub struct PriceChangeMessage {
    pub asset_id: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub bids: Vec<WsPriceLevel>,
    #[serde(default)]
    pub asks: Vec<WsPriceLevel>,
}

#[derive(Debug, Deserialize)]
pub struct TickSizeChangeMessage {
    pub asset_id: String,
    pub new_tick_size: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WsPriceLevel {
    pub price: String,
    pub size: String,
}
