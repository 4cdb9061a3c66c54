//! Typed identifier newtypes backed by strings.
//!
//! Screen and trigger identifiers are assigned by the server that describes
//! the screen, so they are opaque strings rather than generated ids.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is empty (rejected by builders).
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Identifier of a screen instance (the owner of `Screen`-scoped variables).
    ScreenId
);

define_id!(
    /// Identifier of a [`Trigger`](crate::trigger::Trigger) within a screen document.
    TriggerId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_inner_string() {
        let id = ScreenId::new("checkout");
        assert_eq!(id.to_string(), "checkout");
        assert_eq!(id.as_str(), "checkout");
    }

    #[test]
    fn should_serialize_transparently() {
        let id = TriggerId::from("on-visits");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"on-visits\"");
        let parsed: TriggerId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn should_report_empty() {
        assert!(TriggerId::new("").is_empty());
        assert!(!TriggerId::new("t").is_empty());
    }
}
