use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 1;

pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS products (
            id              TEXT PRIMARY KEY,
            display_name    TEXT NOT NULL,
            normalized_name TEXT NOT NULL UNIQUE CHECK(normalized_name != ''),
            brand           TEXT,
            category        TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS aliases (
            id               TEXT PRIMARY KEY,
            product_id       TEXT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            alias_text       TEXT NOT NULL,
            normalized_alias TEXT NOT NULL CHECK(normalized_alias != ''),
            origin           TEXT NOT NULL CHECK(origin IN ('manual', 'auto', 'llm')),
            confidence       REAL NOT NULL CHECK(confidence >= 0.0 AND confidence <= 1.0),
            created_at       TEXT NOT NULL,
            created_by       TEXT NOT NULL,
            UNIQUE (product_id, normalized_alias)
        );

        CREATE TABLE IF NOT EXISTS prices (
            id           TEXT PRIMARY KEY,
            product_id   TEXT NOT NULL REFERENCES products(id),
            amount_cents INTEGER NOT NULL CHECK(amount_cents >= 0),
            store        TEXT,
            observed_at  TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

pub fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_aliases_normalized ON aliases(normalized_alias);
        CREATE INDEX IF NOT EXISTS idx_aliases_product    ON aliases(product_id);
        CREATE INDEX IF NOT EXISTS idx_products_length    ON products(length(normalized_name));
        CREATE INDEX IF NOT EXISTS idx_aliases_length     ON aliases(length(normalized_alias));
        CREATE INDEX IF NOT EXISTS idx_prices_product     ON prices(product_id);
        ",
    )?;
    Ok(())
}
