//! Identifier values
//!
//! Every aggregate is identified by its own UUID newtype, declared with
//! [`entity_id!`](crate::entity_id). Two identifiers are equal only when they
//! share both the concrete type and the textual value.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

pub use uuid::Uuid;

use crate::error::InvalidIdentifierError;

/// Behaviour shared by all aggregate identifiers
pub trait EntityId:
    Copy
    + Debug
    + Display
    + Eq
    + Hash
    + Ord
    + FromStr<Err = InvalidIdentifierError>
    + Send
    + Sync
    + 'static
{
    fn from_uuid(value: Uuid) -> Self;

    fn as_uuid(&self) -> Uuid;
}

/// Parse a hyphenated UUID, rejecting the braced, URN and simple forms
pub fn parse_uuid(value: &str) -> Result<Uuid, InvalidIdentifierError> {
    if value.len() != 36 {
        return Err(InvalidIdentifierError(value.to_string()));
    }
    Uuid::parse_str(value).map_err(|_| InvalidIdentifierError(value.to_string()))
}

/// Declare a UUID-backed identifier type for an aggregate
#[macro_export]
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name($crate::identifier::Uuid);

        impl $name {
            /// Generate a fresh random identifier
            pub fn new() -> Self {
                Self($crate::identifier::Uuid::new_v4())
            }

            pub fn parse(
                value: &str,
            ) -> ::std::result::Result<Self, $crate::error::InvalidIdentifierError> {
                $crate::identifier::parse_uuid(value).map(Self)
            }
        }

        impl ::std::default::Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $crate::identifier::EntityId for $name {
            fn from_uuid(value: $crate::identifier::Uuid) -> Self {
                Self(value)
            }

            fn as_uuid(&self) -> $crate::identifier::Uuid {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0.hyphenated(), f)
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::InvalidIdentifierError;

            fn from_str(value: &str) -> ::std::result::Result<Self, Self::Err> {
                Self::parse(value)
            }
        }

        impl ::std::convert::TryFrom<String> for $name {
            type Error = $crate::error::InvalidIdentifierError;

            fn try_from(value: String) -> ::std::result::Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl ::std::convert::From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::entity_id!(
        /// Identifier used only by these tests
        SampleId
    );

    crate::entity_id!(OtherId);

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(SampleId::new(), SampleId::new());
    }

    #[test]
    fn test_parse_round_trips_text() {
        let text = "8d0b0c1a-6c4c-4c39-9d5d-2b1c4b0f5a11";
        let id = SampleId::parse(text).unwrap();
        assert_eq!(id.to_string(), text);
        assert_eq!(id, text.parse::<SampleId>().unwrap());
    }

    #[test]
    fn test_parse_rejects_malformed_values() {
        for value in [
            "",
            "fake id",
            "8d0b0c1a6c4c4c399d5d2b1c4b0f5a11",
            "{8d0b0c1a-6c4c-4c39-9d5d-2b1c4b0f5a11}",
        ] {
            assert_eq!(
                SampleId::parse(value),
                Err(InvalidIdentifierError(value.to_string()))
            );
        }
    }

    #[test]
    fn test_same_text_different_types_share_uuid_only() {
        let sample = SampleId::new();
        let other = OtherId::from_uuid(sample.as_uuid());
        assert_eq!(sample.to_string(), other.to_string());
    }

    #[test]
    fn test_text_order_matches_id_order() {
        let mut ids: Vec<SampleId> = (0..20).map(|_| SampleId::new()).collect();
        let mut texts: Vec<String> = ids.iter().map(ToString::to_string).collect();
        ids.sort();
        texts.sort();
        let sorted: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(sorted, texts);
    }

    #[test]
    fn test_serde_uses_text_form() {
        let id = SampleId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
        let back: SampleId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_value::<SampleId>(serde_json::json!("nope")).is_err());
    }
}
