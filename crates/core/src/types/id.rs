//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. Backend identifiers
//! are opaque strings, so every ID wraps a `String`.

/// Errors that can occur when parsing an ID.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty or only whitespace.
    #[error("{kind} cannot be empty")]
    Empty {
        /// Name of the ID type being parsed.
        kind: &'static str,
    },
}

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `parse()`, `as_str()`, `into_inner()`
/// - `From<&str>`, `From<String>` and `AsRef<str>` implementations
///
/// # Example
///
/// ```rust
/// # use shop_scout_core::define_id;
/// define_id!(ShopId);
/// define_id!(ReviewId);
///
/// let shop_id = ShopId::new("shop-1");
/// let review_id = ReviewId::new("shop-1");
///
/// // These are different types, so this won't compile:
/// // let _: ShopId = review_id;
/// # let _ = (shop_id, review_id);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Parse an ID, rejecting empty or whitespace-only input.
            ///
            /// # Errors
            ///
            /// Returns `IdError::Empty` if the trimmed input is empty.
            pub fn parse(id: &str) -> ::core::result::Result<Self, $crate::IdError> {
                let trimmed = id.trim();
                if trimmed.is_empty() {
                    return Err($crate::IdError::Empty {
                        kind: stringify!($name),
                    });
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the underlying string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(ShopId);
define_id!(ReviewId);
define_id!(UserId);
define_id!(FileId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_whitespace() {
        let id = ShopId::parse("  shop-1 ").unwrap();
        assert_eq!(id.as_str(), "shop-1");
    }

    #[test]
    fn test_parse_rejects_empty() {
        let err = ReviewId::parse("   ").unwrap_err();
        assert_eq!(err, IdError::Empty { kind: "ReviewId" });
        assert_eq!(err.to_string(), "ReviewId cannot be empty");
    }

    #[test]
    fn test_serde_transparent() {
        let id = UserId::new("user-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"user-42\"");

        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_display_matches_inner() {
        let id = FileId::new("shops/s1/a.jpg");
        assert_eq!(id.to_string(), "shops/s1/a.jpg");
        assert_eq!(String::from(id), "shops/s1/a.jpg");
    }
}
