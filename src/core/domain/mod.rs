//! Core domain types shared across the pipeline.

mod id;
mod market;
mod opportunity;
mod snapshot;
mod trade;

pub use id::{MarketId, TokenId};
pub use market::{Market, Outcome};
pub use opportunity::{Opportunity, OpportunityLeg};
pub use snapshot::Snapshot;
pub use trade::{ExecutionMode, LegResult, TradeRecord, TradeStatus};
