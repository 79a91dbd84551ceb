//! Concrete Polymarket implementations of the core's collaborator traits.

mod catalog;
mod messages;
mod orders;
mod stream;
mod types;
mod wallet;

pub use catalog::PolymarketCatalogClient;
pub use orders::PolymarketOrderClient;
pub use stream::PolymarketStream;
pub use wallet::PolymarketWalletFetcher;
