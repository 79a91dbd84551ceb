//! Polymarket REST API response shapes.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct MarketsResponse {
    pub data: Option<Vec<RawMarket>>,
}

#[derive(Debug, Deserialize)]
pub struct RawMarket {
    pub condition_id: String,
    #[serde(default)]
    pub market_slug: String,
    pub question: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub outcomes: Vec<String>,
    #[serde(default)]
    pub clob_tokens: Vec<String>,
    #[serde(default)]
    pub tokens: Vec<RawToken>,
}

#[derive(Debug, Deserialize)]
pub struct RawToken {
    pub token_id: String,
    pub outcome: String,
}
