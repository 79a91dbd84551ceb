//! Arbitrage opportunity types.

use rust_decimal::Decimal;

use super::id::{MarketId, TokenId};

/// A single leg of a detected opportunity: one outcome to buy.
#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityLeg {
    token_id: TokenId,
    outcome_name: String,
    ask_price: Decimal,
    ask_size: Decimal,
    tick_size: Decimal,
    min_order_size: Decimal,
}

impl OpportunityLeg {
    #[must_use]
    pub fn new(
        token_id: TokenId,
        outcome_name: impl Into<String>,
        ask_price: Decimal,
        ask_size: Decimal,
        tick_size: Decimal,
        min_order_size: Decimal,
    ) -> Self {
        Self {
            token_id,
            outcome_name: outcome_name.into(),
            ask_price,
            ask_size,
            tick_size,
            min_order_size,
        }
    }

    #[must_use]
    pub const fn token_id(&self) -> &TokenId {
        &self.token_id
    }

    #[must_use]
    pub fn outcome_name(&self) -> &str {
        &self.outcome_name
    }

    #[must_use]
    pub const fn ask_price(&self) -> Decimal {
        self.ask_price
    }

    #[must_use]
    pub const fn ask_size(&self) -> Decimal {
        self.ask_size
    }

    #[must_use]
    pub const fn tick_size(&self) -> Decimal {
        self.tick_size
    }

    #[must_use]
    pub const fn min_order_size(&self) -> Decimal {
        self.min_order_size
    }
}

/// A detected arbitrage opportunity: buying `trade_size` units of every
/// outcome of `market_id` at the submitted legs' ask prices.
#[derive(Debug, Clone)]
pub struct Opportunity {
    id: String,
    market_id: MarketId,
    slug: String,
    question: String,
    legs: Vec<OpportunityLeg>,
    trade_size: Decimal,
    price_sum: Decimal,
    profit_margin: Decimal,
    profit_bps: i64,
}

impl Opportunity {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        market_id: MarketId,
        slug: impl Into<String>,
        question: impl Into<String>,
        legs: Vec<OpportunityLeg>,
        trade_size: Decimal,
        price_sum: Decimal,
        profit_margin: Decimal,
        profit_bps: i64,
    ) -> Self {
        Self {
            id,
            market_id,
            slug: slug.into(),
            question: question.into(),
            legs,
            trade_size,
            price_sum,
            profit_margin,
            profit_bps,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn market_id(&self) -> &MarketId {
        &self.market_id
    }

    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn legs(&self) -> &[OpportunityLeg] {
        &self.legs
    }

    #[must_use]
    pub const fn trade_size(&self) -> Decimal {
        self.trade_size
    }

    #[must_use]
    pub const fn price_sum(&self) -> Decimal {
        self.price_sum
    }

    #[must_use]
    pub const fn profit_margin(&self) -> Decimal {
        self.profit_margin
    }

    #[must_use]
    pub const fn profit_bps(&self) -> i64 {
        self.profit_bps
    }

    /// Total notional cost of the opportunity at submission prices.
    #[must_use]
    pub fn total_cost(&self) -> Decimal {
        self.legs.iter().map(|l| l.ask_price * self.trade_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn leg(id: &str, price: Decimal) -> OpportunityLeg {
        OpportunityLeg::new(
            TokenId::from(id),
            id,
            price,
            dec!(100),
            dec!(0.01),
            dec!(5),
        )
    }

    #[test]
    fn total_cost_sums_legs_times_trade_size() {
        let legs = vec![leg("yes", dec!(0.40)), leg("no", dec!(0.50))];
        let opp = Opportunity::new(
            "id".into(),
            MarketId::from("m"),
            "slug",
            "q",
            legs,
            dec!(10),
            dec!(0.90),
            dec!(0.10),
            900,
        );
        assert_eq!(opp.total_cost(), dec!(9.00));
    }
}
