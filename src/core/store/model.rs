//! Diesel row types for the sqlite-backed `Storage` implementation.

use diesel::prelude::*;

use super::schema::{opportunities, trades};

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = opportunities)]
pub struct NewOpportunityRow {
    pub id: String,
    pub market_id: String,
    pub question: String,
    pub leg_count: i32,
    pub price_sum: String,
    pub profit_bps: i64,
    pub detected_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = trades)]
pub struct NewTradeRow {
    pub opportunity_id: String,
    pub mode: String,
    pub status: String,
    pub cost: String,
    pub realized_profit: String,
    pub recorded_at: String,
}
