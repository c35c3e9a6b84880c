use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::ProductId;

/// A price observed on a flyer. The engine only cares that it references a
/// product and must follow that product through merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub id: Uuid,
    pub product_id: ProductId,
    pub amount_cents: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,

    pub observed_at: DateTime<Utc>,
}

impl PriceRecord {
    pub fn new(product_id: ProductId, amount_cents: i64) -> Self {
        Self {
            id: Uuid::now_v7(),
            product_id,
            amount_cents,
            store: None,
            observed_at: super::now(),
        }
    }

    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }
}
