use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::ProductId;
use crate::error::PricewiseError;
use crate::matching::normalize;

/// Who asserted an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasOrigin {
    /// Entered by an operator.
    Manual,
    /// Derived by the system, e.g. a merged product's former name.
    Auto,
    /// Suggested by the extraction model.
    Llm,
}

impl AliasOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
            Self::Llm => "llm",
        }
    }
}

impl fmt::Display for AliasOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AliasOrigin {
    type Err = PricewiseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" | "human" => Ok(Self::Manual),
            "auto" | "automatic" => Ok(Self::Auto),
            "llm" | "model" => Ok(Self::Llm),
            other => Err(PricewiseError::InvalidInput(format!("unknown alias origin: {other}"))),
        }
    }
}

/// Alternate spelling bound to exactly one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub id: Uuid,
    pub product_id: ProductId,
    pub alias_text: String,
    pub normalized_alias: String,
    pub origin: AliasOrigin,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl Alias {
    pub fn new(
        product_id: ProductId,
        alias_text: impl Into<String>,
        origin: AliasOrigin,
        confidence: f64,
    ) -> Self {
        let alias_text = alias_text.into().trim().to_string();
        Self {
            id: Uuid::now_v7(),
            product_id,
            normalized_alias: normalize(&alias_text).into_string(),
            alias_text,
            origin,
            confidence: confidence.clamp(0.0, 1.0),
            created_at: super::now(),
            created_by: "system".to_string(),
        }
    }

    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_new_normalizes_and_clamps() {
        let alias = Alias::new(Uuid::nil(), " Kabotiá ", AliasOrigin::Manual, 1.7);
        assert_eq!(alias.alias_text, "Kabotiá");
        assert_eq!(alias.normalized_alias, "kabotia");
        assert_eq!(alias.confidence, 1.0);
        assert_eq!(alias.created_by, "system");
    }

    #[test]
    fn test_origin_parse() {
        assert_eq!("MANUAL".parse::<AliasOrigin>().unwrap(), AliasOrigin::Manual);
        assert_eq!("llm".parse::<AliasOrigin>().unwrap(), AliasOrigin::Llm);
        assert!("guess".parse::<AliasOrigin>().is_err());
    }
}
