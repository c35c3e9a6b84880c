use rusqlite::Connection;

use crate::error::Result;
use crate::models::CatalogStats;
use crate::storage::repositories::{AliasRegistry, SqliteAliasRegistry};

pub struct CatalogStatsQuery<'a> {
    conn: &'a Connection,
}

impl<'a> CatalogStatsQuery<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get_stats(&self) -> Result<CatalogStats> {
        let products = self.count("SELECT COUNT(*) FROM products")?;
        let aliases = self.count("SELECT COUNT(*) FROM aliases")?;
        let prices = self.count("SELECT COUNT(*) FROM prices")?;
        let branded_products = self.count(
            "SELECT COUNT(*) FROM products WHERE brand IS NOT NULL AND trim(brand) != ''",
        )?;
        let aliases_by_origin = SqliteAliasRegistry::new(self.conn).count_by_origin()?;

        Ok(CatalogStats {
            products,
            aliases,
            aliases_by_origin,
            prices,
            branded_products,
        })
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Alias, AliasOrigin, PriceRecord, Product};
    use crate::storage::database::open_in_memory;
    use crate::storage::repositories::{
        PriceRepository, ProductRepository, SqlitePriceRepository, SqliteProductRepository,
    };

    #[test]
    fn test_stats_counts_everything() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let products = SqliteProductRepository::new(&conn);
        let registry = SqliteAliasRegistry::new(&conn);
        let prices = SqlitePriceRepository::new(&conn);

        let oil = Product::new("Óleo de Soja").with_brand("Liza");
        let rice = Product::new("Arroz Tipo 1").with_brand_opt(Some("  "));
        products.insert(&oil).unwrap();
        products.insert(&rice).unwrap();
        registry
            .add_alias(&Alias::new(oil.id, "Oleo Soja", AliasOrigin::Manual, 1.0))
            .unwrap();
        prices.insert(&PriceRecord::new(oil.id, 799)).unwrap();

        let stats = CatalogStatsQuery::new(&conn).get_stats().unwrap();
        assert_eq!(stats.products, 2);
        assert_eq!(stats.aliases, 1);
        assert_eq!(stats.prices, 1);
        assert_eq!(stats.branded_products, 1);
        assert_eq!(stats.aliases_by_origin.get("manual"), Some(&1));
    }

    #[test]
    fn test_empty_catalog() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        let stats = CatalogStatsQuery::new(&conn).get_stats().unwrap();
        assert_eq!(stats, CatalogStats::default());
    }
}
