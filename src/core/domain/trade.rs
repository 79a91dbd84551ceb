//! Execution result and persisted trade record types.

use rust_decimal::Decimal;

use super::id::TokenId;

/// Whether an opportunity was attempted in simulation or against the
/// live order-placement API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Paper,
    Live,
}

/// Outcome of submitting and (if submitted) verifying a single leg.
#[derive(Debug, Clone)]
pub struct LegResult {
    pub token_id: TokenId,
    pub order_id: Option<String>,
    pub submitted_price: Decimal,
    pub submitted_size: Decimal,
    pub filled_size: Decimal,
    pub filled_price: Option<Decimal>,
    pub success: bool,
}

/// Aggregate status of an execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    Filled,
    Partial,
    Failed,
}

/// Record of one execution attempt, persisted via `Storage`.
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub opportunity_id: String,
    pub mode: ExecutionMode,
    pub legs: Vec<LegResult>,
    pub status: TradeStatus,
    pub cost: Decimal,
    pub realized_profit: Decimal,
}

impl TradeRecord {
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.status == TradeStatus::Filled
    }
}
