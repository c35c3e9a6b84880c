//! `Catalog` is the entry point collaborators use: resolution, ingestion,
//! aliases, duplicate review and merges over one SQLite database.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::dedup::{DuplicateCandidate, DuplicateDetector, RelatedCandidate};
use crate::error::{PricewiseError, Result};
use crate::matching::normalize;
use crate::merge::{MergeApproval, MergeEngine, MergeOutcome, MergeReport};
use crate::models::{
    Alias, AliasOrigin, CatalogStats, Ingested, PriceRecord, Product, ProductId, Resolution,
};
use crate::resolver::CascadingResolver;
use crate::storage::database::{open_database, open_in_memory, ConnectionPool};
use crate::storage::queries::{BidirectionalAliasQuery, BidirectionalPair, CatalogStatsQuery};
use crate::storage::repositories::{
    AliasRegistry, PriceRepository, ProductRepository, Repository, SqliteAliasRegistry,
    SqlitePriceRepository, SqliteProductRepository,
};

/// Totals of one batch merge run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeRunReport {
    pub considered: usize,
    pub applied: usize,
    pub rejected: usize,
    /// Pairs with a side already absorbed earlier in the same run.
    pub skipped: usize,
    pub merges: Vec<MergeReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Product,
    Alias,
}

/// A row whose recomputed key could not be stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenormalizeConflict {
    pub kind: RecordKind,
    pub id: Uuid,
    pub text: String,
    pub current: String,
    pub recomputed: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenormalizeReport {
    pub products_updated: usize,
    pub aliases_updated: usize,
    pub conflicts: Vec<RenormalizeConflict>,
}

impl RenormalizeReport {
    fn push_conflict(&mut self, conflict: RenormalizeConflict) {
        warn!(
            kind = ?conflict.kind,
            id = %conflict.id,
            key = conflict.recomputed.as_str(),
            "renormalized key collides or is empty, keeping the old one"
        );
        self.conflicts.push(conflict);
    }
}

pub struct Catalog {
    pool: ConnectionPool,
    config: EngineConfig,
    resolver: CascadingResolver,
    detector: DuplicateDetector,
    merger: MergeEngine,
}

impl Catalog {
    /// Opens (creating if needed) the database at `path` with default settings.
    pub fn open(path: &Path) -> Result<Self> {
        let mut config = EngineConfig::default();
        config.storage.database_path = path.to_string_lossy().to_string();
        Self::with_pool(open_database(path)?, config)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_pool(open_in_memory()?, EngineConfig::default())
    }

    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let config = config.validated();
        if config.storage.database_path.trim().is_empty() {
            return Err(PricewiseError::ConfigError(
                "storage.database_path is empty".to_string(),
            ));
        }
        let pool = open_database(&config.database_path())?;
        Self::with_pool(pool, config)
    }

    /// In-memory catalog with the given engine settings.
    pub fn in_memory_with_config(config: EngineConfig) -> Result<Self> {
        Self::with_pool(open_in_memory()?, config.validated())
    }

    fn with_pool(pool: ConnectionPool, config: EngineConfig) -> Result<Self> {
        Ok(Self {
            resolver: CascadingResolver::new(config.resolver.clone()),
            detector: DuplicateDetector::from_config(&config.dedup),
            merger: MergeEngine::from_config(&config.merge),
            pool,
            config,
        })
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─── Resolution ────────────────────────────────────────

    /// Resolves with the configured fuzzy threshold.
    pub fn resolve(&self, raw_name: &str, brand: Option<&str>) -> Result<Resolution> {
        self.resolve_with_threshold(raw_name, brand, None)
    }

    /// All stages read one snapshot, so a concurrent merge is seen entirely
    /// or not at all.
    pub fn resolve_with_threshold(
        &self,
        raw_name: &str,
        brand: Option<&str>,
        threshold: Option<f64>,
    ) -> Result<Resolution> {
        let conn = self.pool.get_connection();
        let tx = conn.unchecked_transaction()?;
        let resolution = self.resolver.resolve(&tx, raw_name, brand, threshold)?;
        tx.commit()?;
        Ok(resolution)
    }

    /// Inserts a new product. Fails with `ConstraintViolation` if a live
    /// product already holds the same normalized name.
    pub fn create_product(
        &self,
        display_name: &str,
        brand: Option<&str>,
        category: Option<&str>,
    ) -> Result<Product> {
        let product = Product::new(display_name)
            .with_brand_opt(brand)
            .with_category_opt(category);
        if product.normalized_name.is_empty() {
            return Err(PricewiseError::InvalidInput(format!(
                "product name '{display_name}' has no letters or digits"
            )));
        }

        let conn = self.pool.get_connection();
        SqliteProductRepository::new(&conn).insert(&product)?;
        info!(id = %product.id, name = product.normalized_name.as_str(), "product created");
        Ok(product)
    }

    /// Resolves `raw_name`, creating the product when nothing matches. Losing
    /// a creation race re-resolves and returns the winner's row.
    pub fn get_or_create_product(
        &self,
        raw_name: &str,
        brand: Option<&str>,
        category: Option<&str>,
    ) -> Result<Ingested> {
        let resolution = self.resolve(raw_name, brand)?;
        if let Some(product_id) = resolution.product_id() {
            return Ok(Ingested {
                product_id,
                created: false,
                resolution,
            });
        }

        match self.create_product(raw_name, brand, category) {
            Ok(product) => Ok(Ingested {
                product_id: product.id,
                created: true,
                resolution,
            }),
            Err(err) if err.is_constraint_violation() => {
                debug!(name = raw_name, "lost creation race, re-resolving");
                let resolution = self.resolve(raw_name, brand)?;
                match resolution.product_id() {
                    Some(product_id) => Ok(Ingested {
                        product_id,
                        created: false,
                        resolution,
                    }),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    // ─── Aliases ───────────────────────────────────────────

    /// Returns whether a new alias row was written.
    pub fn add_alias(
        &self,
        product_id: ProductId,
        alias_text: &str,
        origin: AliasOrigin,
        confidence: f64,
    ) -> Result<bool> {
        if alias_text.trim().is_empty() {
            return Err(PricewiseError::InvalidInput("alias text is empty".to_string()));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(PricewiseError::InvalidInput(format!(
                "alias confidence {confidence} is outside [0, 1]"
            )));
        }

        let conn = self.pool.get_connection();
        if SqliteProductRepository::new(&conn).find_by_id(&product_id)?.is_none() {
            return Err(PricewiseError::ProductNotFound(product_id.to_string()));
        }

        let alias = Alias::new(product_id, alias_text, origin, confidence);
        let inserted = SqliteAliasRegistry::new(&conn).add_alias(&alias)?;
        if inserted {
            info!(product = %product_id, alias = alias.normalized_alias.as_str(), %origin, "alias added");
        }
        Ok(inserted)
    }

    pub fn list_aliases(&self, product_id: ProductId) -> Result<Vec<Alias>> {
        let conn = self.pool.get_connection();
        SqliteAliasRegistry::new(&conn).list_aliases(&product_id)
    }

    /// Normalizes `raw_alias` and looks it up in the registry.
    pub fn find_by_alias(&self, raw_alias: &str) -> Result<Option<Product>> {
        let normalized = normalize(raw_alias);
        if normalized.is_empty() {
            return Ok(None);
        }
        let conn = self.pool.get_connection();
        SqliteAliasRegistry::new(&conn).find_by_alias(normalized.as_str())
    }

    // ─── Duplicate review and merge ────────────────────────

    pub fn list_duplicate_candidates(
        &self,
        min_similarity: Option<f64>,
    ) -> Result<Vec<DuplicateCandidate>> {
        let mut detector = self.detector.clone();
        if let Some(min) = min_similarity {
            detector = detector.with_min_similarity(min);
        }
        Ok(detector.find_candidates(&self.snapshot_products()?))
    }

    pub fn list_related_candidates(
        &self,
        min_similarity: Option<f64>,
    ) -> Result<Vec<RelatedCandidate>> {
        let mut detector = self.detector.clone();
        if let Some(min) = min_similarity {
            detector = detector.with_related_min_similarity(min);
        }
        Ok(detector.find_related(&self.snapshot_products()?))
    }

    pub fn propose_merge(
        &self,
        first: ProductId,
        second: ProductId,
        approval: MergeApproval,
    ) -> Result<MergeOutcome> {
        let mut conn = self.pool.get_connection();
        self.merger.propose(&mut conn, first, second, approval)
    }

    /// Merges every duplicate candidate at or above the auto-merge threshold,
    /// one transaction per pair. Stops at the first `PartialMergeFailure`.
    pub fn merge_all_candidates(&self) -> Result<MergeRunReport> {
        let threshold = self
            .merger
            .auto_merge_threshold()
            .max(self.detector.min_similarity());
        let candidates = self.list_duplicate_candidates(Some(threshold))?;

        let mut report = MergeRunReport::default();
        let mut absorbed: HashSet<ProductId> = HashSet::new();

        for candidate in candidates {
            report.considered += 1;
            if absorbed.contains(&candidate.first.id) || absorbed.contains(&candidate.second.id) {
                report.skipped += 1;
                continue;
            }

            match self.propose_merge(candidate.first.id, candidate.second.id, MergeApproval::Automatic)? {
                MergeOutcome::Applied(merge) => {
                    absorbed.insert(merge.loser_id);
                    report.applied += 1;
                    report.merges.push(merge);
                }
                MergeOutcome::Rejected { .. } => report.rejected += 1,
            }
        }

        info!(
            considered = report.considered,
            applied = report.applied,
            rejected = report.rejected,
            skipped = report.skipped,
            "merge run finished"
        );
        Ok(report)
    }

    // ─── Prices ────────────────────────────────────────────

    pub fn record_price(
        &self,
        product_id: ProductId,
        amount_cents: i64,
        store: Option<&str>,
    ) -> Result<PriceRecord> {
        if amount_cents < 0 {
            return Err(PricewiseError::InvalidInput(format!(
                "price {amount_cents} is negative"
            )));
        }

        let conn = self.pool.get_connection();
        if SqliteProductRepository::new(&conn).find_by_id(&product_id)?.is_none() {
            return Err(PricewiseError::ProductNotFound(product_id.to_string()));
        }

        let mut price = PriceRecord::new(product_id, amount_cents);
        if let Some(store) = store.map(str::trim).filter(|s| !s.is_empty()) {
            price = price.with_store(store);
        }
        SqlitePriceRepository::new(&conn).insert(&price)?;
        Ok(price)
    }

    pub fn count_prices(&self, product_id: ProductId) -> Result<usize> {
        let conn = self.pool.get_connection();
        SqlitePriceRepository::new(&conn).count_for_product(&product_id)
    }

    // ─── Products ──────────────────────────────────────────

    pub fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        let conn = self.pool.get_connection();
        SqliteProductRepository::new(&conn).find_by_id(&id)
    }

    pub fn list_products(&self, limit: usize, offset: usize) -> Result<Vec<Product>> {
        let conn = self.pool.get_connection();
        SqliteProductRepository::new(&conn).list(limit, offset)
    }

    pub fn count_products(&self) -> Result<usize> {
        let conn = self.pool.get_connection();
        SqliteProductRepository::new(&conn).count()
    }

    /// Deletes a product and its aliases outright. Products with recorded
    /// prices must be merged instead.
    pub fn delete_product(&self, id: ProductId) -> Result<bool> {
        let conn = self.pool.get_connection();
        let prices = SqlitePriceRepository::new(&conn).count_for_product(&id)?;
        if prices > 0 {
            return Err(PricewiseError::InvalidInput(format!(
                "product {id} has {prices} recorded prices; merge it instead"
            )));
        }
        let deleted = SqliteProductRepository::new(&conn).delete(&id)?;
        if deleted {
            info!(%id, "product deleted");
        }
        Ok(deleted)
    }

    // ─── Maintenance ───────────────────────────────────────

    pub fn find_bidirectional_aliases(&self) -> Result<Vec<BidirectionalPair>> {
        let conn = self.pool.get_connection();
        BidirectionalAliasQuery::new(&conn).find_pairs()
    }

    /// Recomputes every stored key with the current normalizer. Rows whose
    /// new key would collide, or come out empty, keep their old key.
    pub fn renormalize(&self) -> Result<RenormalizeReport> {
        let mut conn = self.pool.get_connection();
        let tx = conn.transaction()?;
        let mut report = RenormalizeReport::default();

        {
            let products = SqliteProductRepository::new(&tx);
            for product in products.list_all()? {
                let recomputed = normalize(&product.display_name).into_string();
                if recomputed == product.normalized_name {
                    continue;
                }
                if !recomputed.is_empty() {
                    match products.set_normalized_name(&product.id, &recomputed) {
                        Ok(()) => {
                            report.products_updated += 1;
                            continue;
                        }
                        Err(err) if err.is_constraint_violation() => {}
                        Err(err) => return Err(err),
                    }
                }
                report.push_conflict(RenormalizeConflict {
                    kind: RecordKind::Product,
                    id: product.id,
                    text: product.display_name,
                    current: product.normalized_name,
                    recomputed,
                });
            }

            let registry = SqliteAliasRegistry::new(&tx);
            for alias in registry.list_all()? {
                let recomputed = normalize(&alias.alias_text).into_string();
                if recomputed == alias.normalized_alias {
                    continue;
                }
                if !recomputed.is_empty() {
                    match registry.set_normalized_alias(&alias.id, &recomputed) {
                        Ok(()) => {
                            report.aliases_updated += 1;
                            continue;
                        }
                        Err(err) if err.is_constraint_violation() => {}
                        Err(err) => return Err(err),
                    }
                }
                report.push_conflict(RenormalizeConflict {
                    kind: RecordKind::Alias,
                    id: alias.id,
                    text: alias.alias_text,
                    current: alias.normalized_alias,
                    recomputed,
                });
            }
        }

        tx.commit()?;
        info!(
            products = report.products_updated,
            aliases = report.aliases_updated,
            conflicts = report.conflicts.len(),
            "renormalization finished"
        );
        Ok(report)
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        let conn = self.pool.get_connection();
        CatalogStatsQuery::new(&conn).get_stats()
    }

    fn snapshot_products(&self) -> Result<Vec<Product>> {
        let conn = self.pool.get_connection();
        SqliteProductRepository::new(&conn).list_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchStage;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let catalog = Catalog::open_in_memory().unwrap();

        let first = catalog
            .get_or_create_product("Coca Cola Lata", Some("Coca-Cola"), Some("Bebidas"))
            .unwrap();
        assert!(first.created);
        assert_eq!(first.resolution, Resolution::NotFound);

        let again = catalog.get_or_create_product("COCA-COLA Lata", None, None).unwrap();
        assert!(!again.created);
        assert_eq!(again.product_id, first.product_id);
        assert_eq!(catalog.count_products().unwrap(), 1);

        let product = catalog.find_product(first.product_id).unwrap().unwrap();
        assert_eq!(product.brand.as_deref(), Some("Coca-Cola"));
        assert_eq!(product.category.as_deref(), Some("Bebidas"));
    }

    #[test]
    fn test_create_product_rejects_duplicates_and_blanks() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.create_product("Coca Cola Lata", None, None).unwrap();

        let dup = catalog.create_product("coca  cola lata", None, None).unwrap_err();
        assert!(dup.is_constraint_violation());
        assert!(matches!(
            catalog.create_product("???", None, None),
            Err(PricewiseError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_add_alias_validation() {
        let catalog = Catalog::open_in_memory().unwrap();
        let product = catalog.create_product("Abóbora Cabotiá", None, None).unwrap();

        assert!(catalog.add_alias(product.id, "Kabotiá", AliasOrigin::Manual, 1.0).unwrap());
        assert!(!catalog.add_alias(product.id, "kabotia", AliasOrigin::Llm, 0.4).unwrap());
        assert!(matches!(
            catalog.add_alias(product.id, "  ", AliasOrigin::Manual, 1.0),
            Err(PricewiseError::InvalidInput(_))
        ));
        assert!(matches!(
            catalog.add_alias(product.id, "Kabutia", AliasOrigin::Manual, 1.2),
            Err(PricewiseError::InvalidInput(_))
        ));
        assert!(matches!(
            catalog.add_alias(ProductId::now_v7(), "Kabutia", AliasOrigin::Manual, 1.0),
            Err(PricewiseError::ProductNotFound(_))
        ));

        assert_eq!(catalog.list_aliases(product.id).unwrap().len(), 1);
        assert_eq!(catalog.find_by_alias("KABOTIÁ").unwrap().unwrap().id, product.id);
        assert!(catalog.find_by_alias("!!").unwrap().is_none());
    }

    #[test]
    fn test_merge_all_candidates() {
        let catalog = Catalog::open_in_memory().unwrap();
        let feijao = catalog.create_product("Feijão Carioca Tipo 1", None, None).unwrap();
        let feijao_dup = catalog.create_product("Feijao Carioca Tipo1", None, None).unwrap();
        catalog.create_product("Papel Higiênico Folha Dupla", None, None).unwrap();
        catalog.create_product("Papel Higiênico Folha Tripla", None, None).unwrap();
        catalog.record_price(feijao_dup.id, 899, Some("Atacadão")).unwrap();

        let report = catalog.merge_all_candidates().unwrap();
        assert_eq!(report.considered, 1);
        assert_eq!(report.applied, 1);
        assert_eq!(report.merges[0].survivor_id, feijao.id);

        assert_eq!(catalog.count_products().unwrap(), 3);
        assert_eq!(catalog.count_prices(feijao.id).unwrap(), 1);
        let resolved = catalog.resolve("Feijao Carioca Tipo1", None).unwrap();
        assert_eq!(resolved.product_id(), Some(feijao.id));
        assert_eq!(resolved.stage(), Some(MatchStage::Alias));

        let again = catalog.merge_all_candidates().unwrap();
        assert_eq!(again, MergeRunReport::default());
    }

    #[test]
    fn test_merge_all_skips_absorbed_products() {
        let catalog = Catalog::open_in_memory().unwrap();
        let a = catalog.create_product("Arroz Agulhinha Tipo 1", None, None).unwrap();
        catalog.create_product("Arroz Agulhinha Tipo1", None, None).unwrap();
        catalog.create_product("Arroz Agulinha Tipo 1", None, None).unwrap();

        let report = catalog.merge_all_candidates().unwrap();
        assert_eq!(report.considered, 3);
        assert_eq!(report.applied + report.skipped + report.rejected, 3);
        assert!(report.applied >= 1);
        assert!(catalog.find_product(a.id).unwrap().is_some());
    }

    #[test]
    fn test_record_price_validation() {
        let catalog = Catalog::open_in_memory().unwrap();
        let product = catalog.create_product("Leite Integral 1L", None, None).unwrap();

        let price = catalog.record_price(product.id, 549, Some("  ")).unwrap();
        assert!(price.store.is_none());
        assert!(matches!(
            catalog.record_price(product.id, -1, None),
            Err(PricewiseError::InvalidInput(_))
        ));
        assert!(matches!(
            catalog.record_price(ProductId::now_v7(), 100, None),
            Err(PricewiseError::ProductNotFound(_))
        ));
        assert_eq!(catalog.count_prices(product.id).unwrap(), 1);
    }

    #[test]
    fn test_delete_product() {
        let catalog = Catalog::open_in_memory().unwrap();
        let priced = catalog.create_product("Leite Integral 1L", None, None).unwrap();
        let bare = catalog.create_product("Leite Desnatado 1L", None, None).unwrap();
        catalog.add_alias(bare.id, "Leite Desnat 1L", AliasOrigin::Manual, 1.0).unwrap();
        catalog.record_price(priced.id, 549, None).unwrap();

        assert!(matches!(
            catalog.delete_product(priced.id),
            Err(PricewiseError::InvalidInput(_))
        ));
        assert!(catalog.delete_product(bare.id).unwrap());
        assert_eq!(catalog.stats().unwrap().aliases, 0);
    }

    #[test]
    fn test_renormalize_reports_collisions() {
        let catalog = Catalog::open_in_memory().unwrap();
        {
            let conn = catalog.pool().get_connection();
            let repo = SqliteProductRepository::new(&conn);
            let mut stale = Product::new("Coca Cola Lata");
            stale.normalized_name = "legacy key one".to_string();
            let mut twin = Product::new("coca  cola LATA!");
            twin.normalized_name = "legacy key two".to_string();
            repo.insert(&stale).unwrap();
            repo.insert(&twin).unwrap();
        }

        let report = catalog.renormalize().unwrap();
        assert_eq!(report.products_updated, 1);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].kind, RecordKind::Product);
        assert_eq!(report.conflicts[0].recomputed, "coca cola lata");

        let second = catalog.renormalize().unwrap();
        assert_eq!(second.products_updated, 0);
        assert_eq!(second.conflicts.len(), 1);
    }

    #[test]
    fn test_list_products_pages() {
        let catalog = Catalog::open_in_memory().unwrap();
        for name in ["Arroz", "Feijão", "Açúcar", "Café"] {
            catalog.create_product(name, None, None).unwrap();
        }
        assert_eq!(catalog.list_products(3, 0).unwrap().len(), 3);
        assert_eq!(catalog.list_products(3, 3).unwrap().len(), 1);
    }

    #[test]
    fn test_from_config_rejects_empty_path() {
        let mut config = EngineConfig::default();
        config.storage.database_path = "  ".to_string();
        assert!(matches!(
            Catalog::from_config(config),
            Err(PricewiseError::ConfigError(_))
        ));
    }
}
