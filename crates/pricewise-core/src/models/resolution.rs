use std::fmt;

use serde::{Deserialize, Serialize};

use super::product::ProductId;

/// Which stage of the cascade produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    Exact,
    Alias,
    AliasFuzzy,
    ProductFuzzy,
}

impl MatchStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Alias => "alias",
            Self::AliasFuzzy => "alias_fuzzy",
            Self::ProductFuzzy => "product_fuzzy",
        }
    }

    pub fn is_fuzzy(self) -> bool {
        matches!(self, Self::AliasFuzzy | Self::ProductFuzzy)
    }
}

impl fmt::Display for MatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMatch {
    pub product_id: ProductId,
    pub stage: MatchStage,
    /// 1.0 for the exact and alias stages.
    pub similarity: f64,
}

/// Outcome of a lookup. Transient, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Matched(ResolvedMatch),
    NotFound,
}

impl Resolution {
    pub fn product_id(&self) -> Option<ProductId> {
        match self {
            Self::Matched(m) => Some(m.product_id),
            Self::NotFound => None,
        }
    }

    pub fn stage(&self) -> Option<MatchStage> {
        match self {
            Self::Matched(m) => Some(m.stage),
            Self::NotFound => None,
        }
    }

    pub fn similarity(&self) -> Option<f64> {
        match self {
            Self::Matched(m) => Some(m.similarity),
            Self::NotFound => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }
}

/// Result of the get-or-create ingestion path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ingested {
    pub product_id: ProductId,
    pub created: bool,
    pub resolution: Resolution,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_resolution_accessors() {
        let matched = Resolution::Matched(ResolvedMatch {
            product_id: Uuid::nil(),
            stage: MatchStage::AliasFuzzy,
            similarity: 0.9,
        });
        assert_eq!(matched.product_id(), Some(Uuid::nil()));
        assert_eq!(matched.similarity(), Some(0.9));
        assert_eq!(matched.stage().map(MatchStage::as_str), Some("alias_fuzzy"));
        assert!(matched.is_match());
        assert!(!Resolution::NotFound.is_match());
        assert_eq!(Resolution::NotFound.product_id(), None);
    }

    #[test]
    fn test_fuzzy_stages() {
        assert!(!MatchStage::Exact.is_fuzzy());
        assert!(!MatchStage::Alias.is_fuzzy());
        assert!(MatchStage::AliasFuzzy.is_fuzzy());
        assert!(MatchStage::ProductFuzzy.is_fuzzy());
    }
}
