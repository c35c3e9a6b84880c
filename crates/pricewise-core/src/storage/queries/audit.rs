//! Consistency checks over the alias graph.

use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;
use crate::models::ProductId;
use crate::storage::rows::uuid_at;

/// Two live products that each hold an alias equal to the other's normalized
/// name. They describe one product that was never merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidirectionalPair {
    pub first_id: ProductId,
    pub first_name: String,
    pub second_id: ProductId,
    pub second_name: String,
}

pub struct BidirectionalAliasQuery<'a> {
    conn: &'a Connection,
}

impl<'a> BidirectionalAliasQuery<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Each pair is reported once, lower id first.
    pub fn find_pairs(&self) -> Result<Vec<BidirectionalPair>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT p1.id, p1.display_name, p2.id, p2.display_name
             FROM products p1
             JOIN aliases a1 ON a1.product_id = p1.id
             JOIN products p2 ON p2.normalized_name = a1.normalized_alias
             JOIN aliases a2 ON a2.product_id = p2.id AND a2.normalized_alias = p1.normalized_name
             WHERE p1.id < p2.id
             ORDER BY p1.id, p2.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(BidirectionalPair {
                first_id: uuid_at(row, 0)?,
                first_name: row.get(1)?,
                second_id: uuid_at(row, 2)?,
                second_name: row.get(3)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }
}
