//! Polymarket wallet balance fetcher.
//!
//! Reads USDC balance from Polymarket's data API rather than the chain
//! directly; on-chain RPC access is an external collaborator the Core
//! does not own (spec.md §1).

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use rust_decimal::Decimal;
use serde::Deserialize;
use url::Url;

use crate::core::exchange::WalletFetcher;
use crate::error::Result;

#[derive(Deserialize)]
struct BalanceResponse {
    /// USDC balance in 6-decimal fixed point, as returned by the API.
    balance: String,
}

/// HTTP client for the Polymarket data API's wallet balance endpoint.
pub struct PolymarketWalletFetcher {
    http: HttpClient,
    base_url: String,
}

impl PolymarketWalletFetcher {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            http: HttpClient::new(),
            base_url,
        }
    }
}

#[async_trait]
impl WalletFetcher for PolymarketWalletFetcher {
    async fn get_balance(&self, address: &str) -> Result<Decimal> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|()| crate::error::Error::Config("data_api_url must not be a cannot-be-a-base URL".into()))?
            .push("balance");
        url.query_pairs_mut().append_pair("address", address);
        let resp: BalanceResponse = self.http.get(url).send().await?.json().await?;
        let fixed_point: i64 = resp.balance.parse().unwrap_or(0);
        Ok(Decimal::new(fixed_point, 6))
    }
}
