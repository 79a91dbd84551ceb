//! Console-logging `Storage` implementation — the always-available
//! default when no relational store is configured.

use async_trait::async_trait;
use tracing::info;

use super::Storage;
use crate::core::domain::{Opportunity, TradeRecord};
use crate::error::Result;

#[derive(Debug, Default)]
pub struct ConsoleStore;

impl ConsoleStore {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Storage for ConsoleStore {
    async fn store_opportunity(&self, opp: &Opportunity) -> Result<()> {
        info!(
            opportunity_id = opp.id(),
            market_id = %opp.market_id(),
            legs = opp.legs().len(),
            profit_bps = opp.profit_bps(),
            "opportunity detected"
        );
        Ok(())
    }

    async fn store_trade(&self, rec: &TradeRecord) -> Result<()> {
        info!(
            opportunity_id = %rec.opportunity_id,
            status = ?rec.status,
            cost = %rec.cost,
            realized_profit = %rec.realized_profit,
            "trade recorded"
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
