mod audit;
mod stats;

pub use audit::{BidirectionalAliasQuery, BidirectionalPair};
pub use stats::CatalogStatsQuery;
