//! Sort order for review lists.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a sort order string is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown review sort order: {0}")]
pub struct SortOrderError(String);

/// Order in which a shop's reviews are requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSortOrder {
    #[default]
    Newest,
    Oldest,
    MostLiked,
    HighestRated,
}

impl ReviewSortOrder {
    /// Wire representation used in query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::MostLiked => "most_liked",
            Self::HighestRated => "highest_rated",
        }
    }
}

impl fmt::Display for ReviewSortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewSortOrder {
    type Err = SortOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "most_liked" => Ok(Self::MostLiked),
            "highest_rated" => Ok(Self::HighestRated),
            _ => Err(SortOrderError(s.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_accepts_kebab_case() {
        assert_eq!(
            "most-liked".parse::<ReviewSortOrder>().unwrap(),
            ReviewSortOrder::MostLiked
        );
        assert_eq!(
            "HIGHEST_RATED".parse::<ReviewSortOrder>().unwrap(),
            ReviewSortOrder::HighestRated
        );
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        let err = "loudest".parse::<ReviewSortOrder>().unwrap_err();
        assert_eq!(err.to_string(), "unknown review sort order: loudest");
    }

    #[test]
    fn test_serde_matches_query_string() {
        let json = serde_json::to_string(&ReviewSortOrder::MostLiked).unwrap();
        assert_eq!(json, format!("\"{}\"", ReviewSortOrder::MostLiked.as_str()));
    }
}
