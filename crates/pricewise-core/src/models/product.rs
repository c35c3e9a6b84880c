use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::matching::normalize;

pub type ProductId = Uuid;

/// Canonical catalog entry for one real-world product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,

    /// Original casing and accents, as first seen.
    pub display_name: String,

    /// Unique among live products.
    pub normalized_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(display_name: impl Into<String>) -> Self {
        let display_name = display_name.into().trim().to_string();
        Self {
            id: Uuid::now_v7(),
            normalized_name: normalize(&display_name).into_string(),
            display_name,
            brand: None,
            category: None,
            created_at: super::now(),
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_brand_opt(mut self, brand: Option<&str>) -> Self {
        self.brand = clean(brand);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_category_opt(mut self, category: Option<&str>) -> Self {
        self.category = clean(category);
        self
    }

    /// Truncated to microseconds, like every stored timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = super::stored_precision(created_at);
        self
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
