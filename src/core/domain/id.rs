//! Stable identifiers for markets and outcome tokens.

use std::fmt;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(MarketId);
string_id!(TokenId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_as_str_match_source() {
        let id = MarketId::from("market-1");
        assert_eq!(id.as_str(), "market-1");
        assert_eq!(id.to_string(), "market-1");
    }

    #[test]
    fn equal_ids_from_string_and_str_are_equal() {
        assert_eq!(TokenId::from("t1".to_string()), TokenId::from("t1"));
    }
}
