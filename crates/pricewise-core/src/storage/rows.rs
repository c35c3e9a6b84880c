//! Column codecs and row mappers shared by repositories and queries.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

use crate::models::{Alias, AliasOrigin, PriceRecord, Product};

pub(crate) const PRODUCT_COLUMNS: &str =
    "p.id, p.display_name, p.normalized_name, p.brand, p.category, p.created_at";

pub(crate) const ALIAS_COLUMNS: &str = "a.id, a.product_id, a.alias_text, a.normalized_alias, \
     a.origin, a.confidence, a.created_at, a.created_by";

/// Fixed-width UTC timestamps so text order equals time order.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SQLite integer for a count or length, saturating at `i64::MAX`.
pub(crate) fn sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Inclusive bounds of the lengths within `max_distance` edits of `len`.
pub(crate) fn length_window(len: usize, max_distance: usize) -> (i64, i64) {
    (
        sql_int(len.saturating_sub(max_distance)),
        sql_int(len.saturating_add(max_distance)),
    )
}

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn origin_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<AliasOrigin> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads `PRODUCT_COLUMNS` starting at `offset`.
pub(crate) fn product_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Product> {
    Ok(Product {
        id: uuid_at(row, offset)?,
        display_name: row.get(offset + 1)?,
        normalized_name: row.get(offset + 2)?,
        brand: row.get(offset + 3)?,
        category: row.get(offset + 4)?,
        created_at: timestamp_at(row, offset + 5)?,
    })
}

/// Reads `ALIAS_COLUMNS` starting at `offset`.
pub(crate) fn alias_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Alias> {
    Ok(Alias {
        id: uuid_at(row, offset)?,
        product_id: uuid_at(row, offset + 1)?,
        alias_text: row.get(offset + 2)?,
        normalized_alias: row.get(offset + 3)?,
        origin: origin_at(row, offset + 4)?,
        confidence: row.get(offset + 5)?,
        created_at: timestamp_at(row, offset + 6)?,
        created_by: row.get(offset + 7)?,
    })
}

pub(crate) fn price_from_row(row: &Row<'_>) -> rusqlite::Result<PriceRecord> {
    Ok(PriceRecord {
        id: uuid_at(row, 0)?,
        product_id: uuid_at(row, 1)?,
        amount_cents: row.get(2)?,
        store: row.get(3)?,
        observed_at: timestamp_at(row, 4)?,
    })
}
