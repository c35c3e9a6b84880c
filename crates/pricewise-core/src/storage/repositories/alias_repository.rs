use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{map_write_error, PricewiseError, Result};
use crate::models::{Alias, Product, ProductId};
use crate::storage::rows::{
    alias_from_row, format_timestamp, length_window, product_from_row, ALIAS_COLUMNS, PRODUCT_COLUMNS,
};

use super::Repository;

/// An alias together with the product that owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedAlias {
    pub alias: Alias,
    pub owner: Product,
}

/// Outcome of moving a product's aliases to another product.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReassignReport {
    pub moved: usize,
    /// Aliases the target already held under the same normalized text. They
    /// stay with the source product.
    pub skipped: Vec<Alias>,
}

/// Known alternate names bound to canonical products.
pub trait AliasRegistry: Repository<Entity = Alias, Id = Uuid> {
    /// Inserts unless the product already holds this normalized alias.
    /// Returns whether a row was written.
    fn add_alias(&self, alias: &Alias) -> Result<bool>;

    /// Highest-confidence alias match, newest owning product first on ties.
    fn find_by_alias(&self, normalized: &str) -> Result<Option<Product>>;

    fn list_aliases(&self, product_id: &ProductId) -> Result<Vec<Alias>>;

    /// Moves every alias of `from` to `to`, skipping those that would break
    /// per-product uniqueness. Only the merge engine calls this.
    fn reassign(&self, from: &ProductId, to: &ProductId) -> Result<ReassignReport>;

    /// Aliases whose normalized text is within `max_distance` characters of
    /// `len` in length, joined with their owners.
    fn within_length(&self, len: usize, max_distance: usize) -> Result<Vec<OwnedAlias>>;

    fn list_all(&self) -> Result<Vec<Alias>>;
    fn count(&self) -> Result<usize>;
    fn count_by_origin(&self) -> Result<BTreeMap<String, usize>>;
    fn set_normalized_alias(&self, id: &Uuid, normalized: &str) -> Result<()>;
}

pub struct SqliteAliasRegistry<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteAliasRegistry<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_aliases(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Alias>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| alias_from_row(row, 0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }
}

impl<'a> Repository for SqliteAliasRegistry<'a> {
    type Entity = Alias;
    type Id = Uuid;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let alias = self
            .conn
            .query_row(
                &format!("SELECT {ALIAS_COLUMNS} FROM aliases a WHERE a.id = ?1"),
                params![id.to_string()],
                |row| alias_from_row(row, 0),
            )
            .optional()?;
        Ok(alias)
    }

    fn save(&self, alias: &Self::Entity) -> Result<()> {
        self.add_alias(alias).map(|_| ())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM aliases WHERE id = ?1", params![id.to_string()])?;
        Ok(deleted > 0)
    }
}

impl<'a> AliasRegistry for SqliteAliasRegistry<'a> {
    fn add_alias(&self, alias: &Alias) -> Result<bool> {
        if alias.normalized_alias.is_empty() {
            return Err(PricewiseError::InvalidInput(format!(
                "alias '{}' normalizes to an empty name",
                alias.alias_text
            )));
        }

        let inserted = self
            .conn
            .execute(
                "INSERT INTO aliases (id, product_id, alias_text, normalized_alias, origin, confidence, created_at, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(product_id, normalized_alias) DO NOTHING",
                params![
                    alias.id.to_string(),
                    alias.product_id.to_string(),
                    alias.alias_text,
                    alias.normalized_alias,
                    alias.origin.as_str(),
                    alias.confidence,
                    format_timestamp(&alias.created_at),
                    alias.created_by,
                ],
            )
            .map_err(|e| map_write_error(e, format!("alias '{}'", alias.normalized_alias)))?;
        Ok(inserted > 0)
    }

    fn find_by_alias(&self, normalized: &str) -> Result<Option<Product>> {
        let product = self
            .conn
            .query_row(
                &format!(
                    "SELECT {PRODUCT_COLUMNS} FROM aliases a
                     JOIN products p ON p.id = a.product_id
                     WHERE a.normalized_alias = ?1
                     ORDER BY a.confidence DESC, p.created_at DESC, p.id DESC
                     LIMIT 1"
                ),
                params![normalized],
                |row| product_from_row(row, 0),
            )
            .optional()?;
        Ok(product)
    }

    fn list_aliases(&self, product_id: &ProductId) -> Result<Vec<Alias>> {
        self.query_aliases(
            &format!(
                "SELECT {ALIAS_COLUMNS} FROM aliases a
                 WHERE a.product_id = ?1
                 ORDER BY a.created_at, a.id"
            ),
            params![product_id.to_string()],
        )
    }

    fn reassign(&self, from: &ProductId, to: &ProductId) -> Result<ReassignReport> {
        let from = from.to_string();
        let to = to.to_string();

        let skipped = self.query_aliases(
            &format!(
                "SELECT {ALIAS_COLUMNS} FROM aliases a
                 WHERE a.product_id = ?1
                   AND a.normalized_alias IN (SELECT normalized_alias FROM aliases WHERE product_id = ?2)
                 ORDER BY a.created_at, a.id"
            ),
            params![from, to],
        )?;

        let moved = self.conn.execute(
            "UPDATE aliases SET product_id = ?2
             WHERE product_id = ?1
               AND normalized_alias NOT IN (SELECT normalized_alias FROM aliases WHERE product_id = ?2)",
            params![from, to],
        )?;

        Ok(ReassignReport { moved, skipped })
    }

    fn within_length(&self, len: usize, max_distance: usize) -> Result<Vec<OwnedAlias>> {
        let (shortest, longest) = length_window(len, max_distance);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALIAS_COLUMNS}, {PRODUCT_COLUMNS} FROM aliases a
             JOIN products p ON p.id = a.product_id
             WHERE length(a.normalized_alias) BETWEEN ?1 AND ?2"
        ))?;
        let rows = stmt.query_map(
            params![shortest, longest],
            |row| {
                Ok(OwnedAlias {
                    alias: alias_from_row(row, 0)?,
                    owner: product_from_row(row, 8)?,
                })
            },
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn list_all(&self) -> Result<Vec<Alias>> {
        self.query_aliases(
            &format!("SELECT {ALIAS_COLUMNS} FROM aliases a ORDER BY a.created_at, a.id"),
            [],
        )
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM aliases", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn count_by_origin(&self) -> Result<BTreeMap<String, usize>> {
        let mut stmt = self
            .conn
            .prepare("SELECT origin, COUNT(*) FROM aliases GROUP BY origin")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;
        let mut counts = BTreeMap::new();
        for row in rows {
            let (origin, count) = row?;
            counts.insert(origin, count);
        }
        Ok(counts)
    }

    fn set_normalized_alias(&self, id: &Uuid, normalized: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE aliases SET normalized_alias = ?2 WHERE id = ?1",
                params![id.to_string(), normalized],
            )
            .map_err(|e| map_write_error(e, format!("alias '{normalized}'")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AliasOrigin;
    use crate::storage::database::open_in_memory;
    use crate::storage::repositories::{ProductRepository, SqliteProductRepository};
    use chrono::{Duration, TimeZone, Utc};

    fn product_at(name: &str, minutes: i64) -> Product {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        Product::new(name).with_created_at(base + Duration::minutes(minutes))
    }

    #[test]
    fn test_add_alias_is_idempotent() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let products = SqliteProductRepository::new(&conn);
        let registry = SqliteAliasRegistry::new(&conn);

        let product = Product::new("Abóbora Cabotiá");
        products.insert(&product).unwrap();

        let first = Alias::new(product.id, "Kabotiá", AliasOrigin::Manual, 1.0);
        let again = Alias::new(product.id, "KABOTIA!", AliasOrigin::Llm, 0.5);
        assert!(registry.add_alias(&first).unwrap());
        assert!(!registry.add_alias(&again).unwrap());

        let aliases = registry.list_aliases(&product.id).unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].origin, AliasOrigin::Manual);
    }

    #[test]
    fn test_empty_alias_is_rejected() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let products = SqliteProductRepository::new(&conn);
        let registry = SqliteAliasRegistry::new(&conn);

        let product = Product::new("Arroz");
        products.insert(&product).unwrap();

        let err = registry
            .add_alias(&Alias::new(product.id, "?!", AliasOrigin::Manual, 1.0))
            .unwrap_err();
        assert!(matches!(err, PricewiseError::InvalidInput(_)));
    }

    #[test]
    fn test_find_by_alias_prefers_confidence_then_newest_product() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let products = SqliteProductRepository::new(&conn);
        let registry = SqliteAliasRegistry::new(&conn);

        let old = product_at("Refrigerante Cola 2L", 0);
        let new = product_at("Refrigerante de Cola 2 Litros", 10);
        let other = product_at("Refri Cola Garrafa", 20);
        for p in [&old, &new, &other] {
            products.insert(p).unwrap();
        }

        registry
            .add_alias(&Alias::new(old.id, "Refri Cola", AliasOrigin::Manual, 0.9))
            .unwrap();
        registry
            .add_alias(&Alias::new(new.id, "Refri Cola", AliasOrigin::Manual, 0.9))
            .unwrap();
        registry
            .add_alias(&Alias::new(other.id, "Refri Cola", AliasOrigin::Llm, 0.6))
            .unwrap();

        let found = registry.find_by_alias("refri cola").unwrap().unwrap();
        assert_eq!(found.id, new.id);
        assert!(registry.find_by_alias("nada").unwrap().is_none());
    }

    #[test]
    fn test_reassign_skips_aliases_target_already_holds() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let products = SqliteProductRepository::new(&conn);
        let registry = SqliteAliasRegistry::new(&conn);

        let survivor = product_at("Abóbora Cabotiá", 0);
        let loser = product_at("Abóbora Kabotiá", 5);
        products.insert(&survivor).unwrap();
        products.insert(&loser).unwrap();

        registry
            .add_alias(&Alias::new(survivor.id, "Kabotiá", AliasOrigin::Manual, 1.0))
            .unwrap();
        registry
            .add_alias(&Alias::new(loser.id, "Kabotia", AliasOrigin::Llm, 0.7))
            .unwrap();
        registry
            .add_alias(&Alias::new(loser.id, "Abobora Japonesa", AliasOrigin::Manual, 1.0))
            .unwrap();

        let report = registry.reassign(&loser.id, &survivor.id).unwrap();
        assert_eq!(report.moved, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].normalized_alias, "kabotia");

        let survivor_aliases: Vec<String> = registry
            .list_aliases(&survivor.id)
            .unwrap()
            .into_iter()
            .map(|a| a.normalized_alias)
            .collect();
        assert_eq!(survivor_aliases, vec!["kabotia", "abobora japonesa"]);
    }

    #[test]
    fn test_aliases_cascade_with_product() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let products = SqliteProductRepository::new(&conn);
        let registry = SqliteAliasRegistry::new(&conn);

        let product = Product::new("Feijão Preto");
        products.insert(&product).unwrap();
        registry
            .add_alias(&Alias::new(product.id, "Feijao Preto Tipo 1", AliasOrigin::Auto, 0.8))
            .unwrap();

        products.delete(&product.id).unwrap();
        assert_eq!(registry.count().unwrap(), 0);
    }

    #[test]
    fn test_within_length_joins_owner() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let products = SqliteProductRepository::new(&conn);
        let registry = SqliteAliasRegistry::new(&conn);

        let product = Product::new("Óleo de Soja").with_brand("Liza");
        products.insert(&product).unwrap();
        registry
            .add_alias(&Alias::new(product.id, "Oleo Soja", AliasOrigin::Manual, 1.0))
            .unwrap();

        let near = registry.within_length("oleo soja".len(), 3).unwrap();
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].owner.brand.as_deref(), Some("Liza"));
        assert!(registry.within_length(40, 3).unwrap().is_empty());
    }

    #[test]
    fn test_count_by_origin() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let products = SqliteProductRepository::new(&conn);
        let registry = SqliteAliasRegistry::new(&conn);

        let product = Product::new("Café Torrado");
        products.insert(&product).unwrap();
        registry
            .add_alias(&Alias::new(product.id, "Cafe Torrado e Moido", AliasOrigin::Manual, 1.0))
            .unwrap();
        registry
            .add_alias(&Alias::new(product.id, "Cafe Tradicional", AliasOrigin::Llm, 0.6))
            .unwrap();

        let counts = registry.count_by_origin().unwrap();
        assert_eq!(counts.get("manual"), Some(&1));
        assert_eq!(counts.get("llm"), Some(&1));
        assert_eq!(counts.get("auto"), None);
    }
}
