use rusqlite::{params, Connection};

use crate::error::{map_write_error, Result};
use crate::models::{PriceRecord, ProductId};
use crate::storage::rows::{format_timestamp, price_from_row};

/// Observed prices. Records only ever move between products during a merge.
pub trait PriceRepository {
    fn insert(&self, price: &PriceRecord) -> Result<()>;

    /// Points every price of `from` at `to`. Returns the number moved.
    fn repoint(&self, from: &ProductId, to: &ProductId) -> Result<usize>;

    fn list_for_product(&self, product_id: &ProductId) -> Result<Vec<PriceRecord>>;
    fn count_for_product(&self, product_id: &ProductId) -> Result<usize>;
    fn count(&self) -> Result<usize>;
}

pub struct SqlitePriceRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePriceRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl<'a> PriceRepository for SqlitePriceRepository<'a> {
    fn insert(&self, price: &PriceRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO prices (id, product_id, amount_cents, store, observed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    price.id.to_string(),
                    price.product_id.to_string(),
                    price.amount_cents,
                    price.store,
                    format_timestamp(&price.observed_at),
                ],
            )
            .map_err(|e| map_write_error(e, format!("price {}", price.id)))?;
        Ok(())
    }

    fn repoint(&self, from: &ProductId, to: &ProductId) -> Result<usize> {
        let moved = self.conn.execute(
            "UPDATE prices SET product_id = ?2 WHERE product_id = ?1",
            params![from.to_string(), to.to_string()],
        )?;
        Ok(moved)
    }

    fn list_for_product(&self, product_id: &ProductId) -> Result<Vec<PriceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, product_id, amount_cents, store, observed_at FROM prices
             WHERE product_id = ?1
             ORDER BY observed_at, id",
        )?;
        let rows = stmt.query_map(params![product_id.to_string()], price_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn count_for_product(&self, product_id: &ProductId) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM prices WHERE product_id = ?1",
            params![product_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM prices", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
