//! Persistence layer with pluggable storage backends.
//!
//! `Storage::store_opportunity`/`store_trade` are fire-and-log from the
//! caller's perspective (spec.md §4.4/§4.5): a write failure here is
//! logged and never blocks detection or execution.

mod console;
mod db;
mod model;
mod schema;
mod sqlite;

pub use console::ConsoleStore;
pub use db::{create_pool, DbPool};
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::core::domain::{Opportunity, TradeRecord};
use crate::error::Result;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn store_opportunity(&self, opp: &Opportunity) -> Result<()>;
    async fn store_trade(&self, rec: &TradeRecord) -> Result<()>;
    async fn close(&self) -> Result<()>;
}
