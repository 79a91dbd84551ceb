//! SQLite-backed `Storage` implementation using Diesel.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;

use super::model::{NewOpportunityRow, NewTradeRow};
use super::schema::{opportunities, trades};
use super::{DbPool, Storage};
use crate::core::domain::{ExecutionMode, Opportunity, TradeRecord, TradeStatus};
use crate::error::{Error, Result};

pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for SqliteStore {
    async fn store_opportunity(&self, opp: &Opportunity) -> Result<()> {
        let row = NewOpportunityRow {
            id: opp.id().to_string(),
            market_id: opp.market_id().to_string(),
            question: opp.question().to_string(),
            leg_count: opp.legs().len() as i32,
            price_sum: opp.price_sum().to_string(),
            profit_bps: opp.profit_bps(),
            detected_at: Utc::now().to_rfc3339(),
        };

        let mut conn = self.pool.get().map_err(|e| Error::Connection(e.to_string()))?;
        diesel::replace_into(opportunities::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn store_trade(&self, rec: &TradeRecord) -> Result<()> {
        let row = NewTradeRow {
            opportunity_id: rec.opportunity_id.clone(),
            mode: match rec.mode {
                ExecutionMode::Paper => "paper".to_string(),
                ExecutionMode::Live => "live".to_string(),
            },
            status: match rec.status {
                TradeStatus::Filled => "filled".to_string(),
                TradeStatus::Partial => "partial".to_string(),
                TradeStatus::Failed => "failed".to_string(),
            },
            cost: rec.cost.to_string(),
            realized_profit: rec.realized_profit.to_string(),
            recorded_at: Utc::now().to_rfc3339(),
        };

        let mut conn = self.pool.get().map_err(|e| Error::Connection(e.to_string()))?;
        diesel::insert_into(trades::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
