pub mod catalog;
pub mod config;
pub mod dedup;
pub mod error;
pub mod matching;
pub mod merge;
pub mod models;
pub mod resolver;
pub mod storage;

pub use catalog::{Catalog, MergeRunReport, RecordKind, RenormalizeConflict, RenormalizeReport};
pub use config::{DedupConfig, EngineConfig, MergeConfig, ResolverConfig, StorageConfig};
pub use error::{ExitCode, PricewiseError, Result};
pub use models::*;

pub use dedup::{DuplicateCandidate, DuplicateDetector, RelatedCandidate, RelationReason};
pub use matching::{has_conflicting_variant_markers, normalize, similarity, NormalizedName};
pub use merge::{
    choose_survivor, MergeApproval, MergeEngine, MergeOutcome, MergeReport, MergeState,
    RejectReason,
};
pub use resolver::{CascadingResolver, MatchStrategy, ResolveRequest};

pub use storage::database::{open_database, open_in_memory, ConnectionPool};
pub use storage::queries::{BidirectionalAliasQuery, BidirectionalPair, CatalogStatsQuery};
pub use storage::repositories::{
    AliasRegistry, OwnedAlias, PriceRepository, ProductRepository, ReassignReport, Repository,
    SqliteAliasRegistry, SqlitePriceRepository, SqliteProductRepository,
};
