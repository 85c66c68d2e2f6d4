//! Numeric identifiers assigned by the Hadiya backend.
//!
//! Each id is a transparent newtype over `i64` so a conversation id can never
//! be passed where a message id is expected. On the wire they are plain JSON
//! numbers.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a customer/courier conversation.
    ConversationId
);

numeric_id!(
    /// Server-assigned message identifier. Authoritative for deduplication.
    MessageId
);

numeric_id!(
    /// Identifier of a customer or courier account.
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&MessageId(501)).unwrap();
        assert_eq!(json, "501");
        let parsed: ConversationId = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, ConversationId(42));
    }

    #[test]
    fn ids_parse_from_cli_strings() {
        assert_eq!(" 42 ".parse::<ConversationId>().unwrap(), ConversationId(42));
        assert!("forty-two".parse::<UserId>().is_err());
    }
}
