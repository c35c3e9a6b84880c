use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub products: usize,
    pub aliases: usize,
    pub aliases_by_origin: BTreeMap<String, usize>,
    pub prices: usize,
    pub branded_products: usize,
}
