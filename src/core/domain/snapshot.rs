//! Orderbook best-level snapshot.

use rust_decimal::Decimal;

use super::id::{MarketId, TokenId};

/// Best bid/ask snapshot for a single outcome token.
///
/// Invariants enforced by construction and by [`OrderbookManager`](crate::core::orderbook::OrderbookManager):
/// bid price < ask price when both present, sizes are positive when a
/// price is present, and `sequence` is monotone non-decreasing per token.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    token_id: TokenId,
    market_id: MarketId,
    best_bid_price: Option<Decimal>,
    best_bid_size: Option<Decimal>,
    best_ask_price: Option<Decimal>,
    best_ask_size: Option<Decimal>,
    sequence: u64,
}

impl Snapshot {
    #[must_use]
    pub fn new(token_id: TokenId, market_id: MarketId, sequence: u64) -> Self {
        Self {
            token_id,
            market_id,
            best_bid_price: None,
            best_bid_size: None,
            best_ask_price: None,
            best_ask_size: None,
            sequence,
        }
    }

    #[must_use]
    pub const fn token_id(&self) -> &TokenId {
        &self.token_id
    }

    #[must_use]
    pub const fn market_id(&self) -> &MarketId {
        &self.market_id
    }

    #[must_use]
    pub const fn best_bid_price(&self) -> Option<Decimal> {
        self.best_bid_price
    }

    #[must_use]
    pub const fn best_bid_size(&self) -> Option<Decimal> {
        self.best_bid_size
    }

    #[must_use]
    pub const fn best_ask_price(&self) -> Option<Decimal> {
        self.best_ask_price
    }

    #[must_use]
    pub const fn best_ask_size(&self) -> Option<Decimal> {
        self.best_ask_size
    }

    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    #[must_use]
    pub fn has_valid_ask(&self) -> bool {
        self.best_ask_price.is_some() && self.best_ask_size.is_some()
    }

    /// Invariant (a)/(b): a present price must have a positive size, and
    /// bid must be strictly below ask when both sides are present.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        if let Some(bid) = self.best_bid_price {
            if self.best_bid_size.map_or(true, |s| s <= Decimal::ZERO) {
                return false;
            }
            if let Some(ask) = self.best_ask_price {
                if bid >= ask {
                    return false;
                }
            }
        }
        if self.best_ask_price.is_some() && self.best_ask_size.map_or(true, |s| s <= Decimal::ZERO) {
            return false;
        }
        true
    }

    pub fn set_bid(&mut self, price: Decimal, size: Decimal) {
        self.best_bid_price = Some(price);
        self.best_bid_size = Some(size);
    }

    pub fn set_ask(&mut self, price: Decimal, size: Decimal) {
        self.best_ask_price = Some(price);
        self.best_ask_size = Some(size);
    }

    /// Updates the bid price only, leaving the stored size untouched.
    pub fn set_bid_price(&mut self, price: Decimal) {
        self.best_bid_price = Some(price);
    }

    /// Updates the ask price only, leaving the stored size untouched.
    pub fn set_ask_price(&mut self, price: Decimal) {
        self.best_ask_price = Some(price);
    }

    pub fn clear_bid(&mut self) {
        self.best_bid_price = None;
        self.best_bid_size = None;
    }

    pub fn clear_ask(&mut self) {
        self.best_ask_price = None;
        self.best_ask_size = None;
    }

    pub fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snap() -> Snapshot {
        Snapshot::new(TokenId::from("tok"), MarketId::from("mkt"), 1)
    }

    #[test]
    fn fresh_snapshot_is_consistent_and_has_no_ask() {
        let s = snap();
        assert!(s.is_consistent());
        assert!(!s.has_valid_ask());
    }

    #[test]
    fn bid_below_ask_is_consistent() {
        let mut s = snap();
        s.set_bid(dec!(0.40), dec!(10));
        s.set_ask(dec!(0.50), dec!(10));
        assert!(s.is_consistent());
        assert!(s.has_valid_ask());
    }

    #[test]
    fn bid_at_or_above_ask_is_inconsistent() {
        let mut s = snap();
        s.set_bid(dec!(0.50), dec!(10));
        s.set_ask(dec!(0.50), dec!(10));
        assert!(!s.is_consistent());
    }

    #[test]
    fn zero_size_with_price_is_inconsistent() {
        let mut s = snap();
        s.set_ask(dec!(0.50), dec!(0));
        assert!(!s.is_consistent());
    }
}
