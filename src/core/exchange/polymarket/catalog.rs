//! Polymarket REST catalog client.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::{debug, info};
use url::Url;

use super::types::MarketsResponse;
use crate::core::exchange::{CatalogClient, CatalogMarket};
use crate::error::{Error, Result};

/// HTTP client for the Polymarket CLOB `/markets` endpoint.
pub struct PolymarketCatalogClient {
    http: HttpClient,
    base_url: String,
}

impl PolymarketCatalogClient {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            http: HttpClient::new(),
            base_url,
        }
    }
}

#[async_trait]
impl CatalogClient for PolymarketCatalogClient {
    async fn fetch_active_markets(&self, limit: usize, offset: usize) -> Result<Vec<CatalogMarket>> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|()| Error::Config("catalog_url must not be a cannot-be-a-base URL".into()))?
            .push("markets");
        url.query_pairs_mut()
            .append_pair("active", "true")
            .append_pair("closed", "false")
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());

        info!(url = %url, "fetching market catalog page");

        let response: MarketsResponse = self.http.get(url).send().await?.json().await?;
        let markets = response.data.unwrap_or_default();
        debug!(count = markets.len(), offset, "fetched catalog page");

        Ok(markets
            .into_iter()
            .map(|m| {
                let clob_tokens = if m.clob_tokens.is_empty() {
                    m.tokens.iter().map(|t| t.token_id.clone()).collect()
                } else {
                    m.clob_tokens
                };
                let outcomes = if m.outcomes.is_empty() {
                    m.tokens.iter().map(|t| t.outcome.clone()).collect()
                } else {
                    m.outcomes
                };
                CatalogMarket {
                    id: m.condition_id,
                    slug: m.market_slug,
                    question: m.question.unwrap_or_default(),
                    active: m.active,
                    closed: m.closed,
                    outcomes,
                    clob_tokens,
                }
            })
            .collect())
    }
}
