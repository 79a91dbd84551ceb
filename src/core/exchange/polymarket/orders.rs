//! Polymarket order-placement REST client.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::core::exchange::{FillStatus, OrderClient, OrderLeg, OrderResponse, OrderSide};
use crate::error::{Error, Result};

#[derive(Serialize)]
struct OrderPayload {
    token_id: String,
    side: &'static str,
    price: String,
    size: String,
}

#[derive(Deserialize)]
struct OrderApiResponse {
    success: bool,
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_msg: Option<String>,
}

#[derive(Deserialize)]
struct FillApiResponse {
    #[serde(default)]
    size_matched: Option<String>,
}

/// HTTP client for the Polymarket order-placement API.
pub struct PolymarketOrderClient {
    http: HttpClient,
    base_url: String,
}

impl PolymarketOrderClient {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            http: HttpClient::new(),
            base_url,
        }
    }
}

#[async_trait]
impl OrderClient for PolymarketOrderClient {
    async fn place_orders(&self, legs: &[OrderLeg]) -> Result<Vec<OrderResponse>> {
        let payload: Vec<OrderPayload> = legs
            .iter()
            .map(|leg| OrderPayload {
                token_id: leg.token_id.to_string(),
                side: match leg.side {
                    OrderSide::Buy => "BUY",
                    OrderSide::Sell => "SELL",
                },
                price: leg.price.to_string(),
                size: leg.size.to_string(),
            })
            .collect();

        info!(legs = payload.len(), "submitting batched orders");

        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|()| Error::Config("orders_url must not be a cannot-be-a-base URL".into()))?
            .push("orders");
        let responses: Vec<OrderApiResponse> =
            self.http.post(url).json(&payload).send().await?.json().await?;

        Ok(responses
            .into_iter()
            .map(|r| OrderResponse {
                success: r.success,
                order_id: r.order_id,
                status: r.status.unwrap_or_default(),
                error_msg: r.error_msg,
            })
            .collect())
    }

    async fn get_fill(&self, order_id: &str) -> Result<FillStatus> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|()| Error::Config("orders_url must not be a cannot-be-a-base URL".into()))?
            .extend(["order", order_id]);
        let resp: FillApiResponse = self.http.get(url).send().await?.json().await?;
        let filled_size = resp
            .size_matched
            .and_then(|s| s.parse::<Decimal>().ok())
            .unwrap_or(Decimal::ZERO);
        Ok(FillStatus { filled_size })
    }
}
