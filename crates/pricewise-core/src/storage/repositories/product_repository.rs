use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{map_write_error, Result};
use crate::models::{Product, ProductId};
use crate::storage::rows::{format_timestamp, length_window, product_from_row, sql_int, PRODUCT_COLUMNS};

use super::Repository;

pub trait ProductRepository: Repository<Entity = Product, Id = ProductId> {
    /// Plain insert. A second live product with the same normalized name
    /// fails with `ConstraintViolation`.
    fn insert(&self, product: &Product) -> Result<()>;
    fn find_by_normalized_name(&self, normalized: &str) -> Result<Option<Product>>;
    fn list(&self, limit: usize, offset: usize) -> Result<Vec<Product>>;
    fn list_all(&self) -> Result<Vec<Product>>;
    fn count(&self) -> Result<usize>;
    /// Products whose normalized name is within `max_distance` characters of
    /// `len` in length, the only ones that can be within that edit distance.
    fn within_length(&self, len: usize, max_distance: usize) -> Result<Vec<Product>>;
    fn update_details(&self, id: &ProductId, brand: Option<&str>, category: Option<&str>) -> Result<()>;
    fn set_normalized_name(&self, id: &ProductId, normalized: &str) -> Result<()>;
}

pub struct SqliteProductRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteProductRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_products(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Product>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| product_from_row(row, 0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }
}

impl<'a> Repository for SqliteProductRepository<'a> {
    type Entity = Product;
    type Id = ProductId;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let result = self.conn.query_row(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ?1"),
            params![id.to_string()],
            |row| product_from_row(row, 0),
        );

        match result {
            Ok(product) => Ok(Some(product)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, product: &Self::Entity) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO products (id, display_name, normalized_name, brand, category, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    display_name    = excluded.display_name,
                    normalized_name = excluded.normalized_name,
                    brand           = excluded.brand,
                    category        = excluded.category",
                params![
                    product.id.to_string(),
                    product.display_name,
                    product.normalized_name,
                    product.brand,
                    product.category,
                    format_timestamp(&product.created_at),
                ],
            )
            .map_err(|e| map_write_error(e, format!("product '{}'", product.normalized_name)))?;
        Ok(())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM products WHERE id = ?1", params![id.to_string()])?;
        Ok(deleted > 0)
    }
}

impl<'a> ProductRepository for SqliteProductRepository<'a> {
    fn insert(&self, product: &Product) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO products (id, display_name, normalized_name, brand, category, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    product.id.to_string(),
                    product.display_name,
                    product.normalized_name,
                    product.brand,
                    product.category,
                    format_timestamp(&product.created_at),
                ],
            )
            .map_err(|e| map_write_error(e, format!("product '{}'", product.normalized_name)))?;
        Ok(())
    }

    fn find_by_normalized_name(&self, normalized: &str) -> Result<Option<Product>> {
        let product = self
            .conn
            .query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.normalized_name = ?1"),
                params![normalized],
                |row| product_from_row(row, 0),
            )
            .optional()?;
        Ok(product)
    }

    fn list(&self, limit: usize, offset: usize) -> Result<Vec<Product>> {
        self.query_products(
            &format!(
                "SELECT {PRODUCT_COLUMNS} FROM products p
                 ORDER BY p.created_at, p.id LIMIT ?1 OFFSET ?2"
            ),
            params![sql_int(limit), sql_int(offset)],
        )
    }

    fn list_all(&self) -> Result<Vec<Product>> {
        self.query_products(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products p ORDER BY p.created_at, p.id"),
            [],
        )
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn within_length(&self, len: usize, max_distance: usize) -> Result<Vec<Product>> {
        let (shortest, longest) = length_window(len, max_distance);
        self.query_products(
            &format!(
                "SELECT {PRODUCT_COLUMNS} FROM products p
                 WHERE length(p.normalized_name) BETWEEN ?1 AND ?2"
            ),
            params![shortest, longest],
        )
    }

    fn update_details(&self, id: &ProductId, brand: Option<&str>, category: Option<&str>) -> Result<()> {
        self.conn.execute(
            "UPDATE products SET brand = ?2, category = ?3 WHERE id = ?1",
            params![id.to_string(), brand, category],
        )?;
        Ok(())
    }

    fn set_normalized_name(&self, id: &ProductId, normalized: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE products SET normalized_name = ?2 WHERE id = ?1",
                params![id.to_string(), normalized],
            )
            .map_err(|e| map_write_error(e, format!("product '{normalized}'")))?;
        Ok(())
    }
}
