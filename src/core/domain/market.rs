//! Market and outcome token domain types.

use super::id::{MarketId, TokenId};

/// A single outcome token within a market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    token_id: TokenId,
    name: String,
}

impl Outcome {
    #[must_use]
    pub fn new(token_id: TokenId, name: impl Into<String>) -> Self {
        Self {
            token_id,
            name: name.into(),
        }
    }

    #[must_use]
    pub const fn token_id(&self) -> &TokenId {
        &self.token_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A market trading N mutually exclusive outcome tokens.
///
/// Immutable once discovered: identity is `market_id`, attributes never
/// change for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Market {
    market_id: MarketId,
    slug: String,
    question: String,
    outcomes: Vec<Outcome>,
}

impl Market {
    #[must_use]
    pub fn new(
        market_id: MarketId,
        slug: impl Into<String>,
        question: impl Into<String>,
        outcomes: Vec<Outcome>,
    ) -> Self {
        Self {
            market_id,
            slug: slug.into(),
            question: question.into(),
            outcomes,
        }
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
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    #[must_use]
    pub fn outcome_count(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn token_ids(&self) -> Vec<&TokenId> {
        self.outcomes.iter().map(Outcome::token_id).collect()
    }

    /// Reject markets with fewer than two outcomes, or fewer than two
    /// outcomes with a non-empty token id.
    #[must_use]
    pub fn is_tradeable(&self) -> bool {
        if self.outcomes.len() < 2 {
            return false;
        }
        self.outcomes
            .iter()
            .filter(|o| !o.token_id().as_str().is_empty())
            .count()
            >= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(n: usize) -> Market {
        let outcomes = (0..n)
            .map(|i| Outcome::new(TokenId::from(format!("tok-{i}")), format!("Outcome {i}")))
            .collect();
        Market::new(MarketId::from("m1"), "m1-slug", "Will it happen?", outcomes)
    }

    #[test]
    fn binary_market_is_tradeable() {
        assert!(market(2).is_tradeable());
    }

    #[test]
    fn single_outcome_market_is_not_tradeable() {
        assert!(!market(1).is_tradeable());
    }

    #[test]
    fn market_with_one_empty_token_id_is_still_tradeable_with_two_valid() {
        let outcomes = vec![
            Outcome::new(TokenId::from(""), "Bad"),
            Outcome::new(TokenId::from("t1"), "Good"),
            Outcome::new(TokenId::from("t2"), "Good2"),
        ];
        let m = Market::new(MarketId::from("m2"), "s", "q", outcomes);
        assert!(m.is_tradeable());
    }

    #[test]
    fn market_with_only_one_valid_token_id_is_not_tradeable() {
        let outcomes = vec![
            Outcome::new(TokenId::from(""), "Bad"),
            Outcome::new(TokenId::from("t1"), "Good"),
        ];
        let m = Market::new(MarketId::from("m3"), "s", "q", outcomes);
        assert!(!m.is_tradeable());
    }

    #[test]
    fn token_ids_preserve_outcome_order() {
        let m = market(3);
        let ids = m.token_ids();
        assert_eq!(ids[0].as_str(), "tok-0");
        assert_eq!(ids[2].as_str(), "tok-2");
    }
}
