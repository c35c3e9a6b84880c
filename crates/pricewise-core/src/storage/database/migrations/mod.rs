mod v1_initial;

use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::Result;

pub trait Migration {
    fn version(&self) -> u32;
    fn description(&self) -> &'static str;
    fn up(&self, conn: &Connection) -> Result<()>;
}

fn all_migrations() -> Vec<Box<dyn Migration>> {
    vec![Box::new(v1_initial::V1Initial)]
}

fn record_migration(conn: &Connection, version: u32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![version, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn has_migrations_table(conn: &Connection) -> Result<bool> {
    let exists = conn
        .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name='schema_migrations'")?
        .exists([])?;
    Ok(exists)
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    apply_pending(conn, all_migrations())
}

/// Applies every migration newer than the highest recorded version, lowest
/// first. Each `up` commits together with its ledger row, so a failing step
/// leaves neither its schema changes nor its version behind.
fn apply_pending(conn: &Connection, mut migrations: Vec<Box<dyn Migration>>) -> Result<()> {
    migrations.sort_by_key(|m| m.version());
    let current = get_applied_versions(conn)?.last().copied().unwrap_or(0);

    let mut applied = 0;
    for migration in migrations.iter().filter(|m| m.version() > current) {
        debug!(version = migration.version(), "applying migration: {}", migration.description());
        let tx = conn.unchecked_transaction()?;
        migration.up(&tx)?;
        record_migration(&tx, migration.version())?;
        tx.commit()?;
        applied += 1;
    }

    if applied > 0 {
        info!(from = current, applied, "schema migrated");
    }
    Ok(())
}

pub fn get_applied_versions(conn: &Connection) -> Result<Vec<u32>> {
    if !has_migrations_table(conn)? {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    let mut versions = Vec::new();
    for row in rows {
        versions.push(row?);
    }
    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PricewiseError;

    struct AddNotes;

    impl Migration for AddNotes {
        fn version(&self) -> u32 {
            2
        }

        fn description(&self) -> &'static str {
            "Add notes table"
        }

        fn up(&self, conn: &Connection) -> Result<()> {
            conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT);")?;
            Ok(())
        }
    }

    struct BrokenAfterCreate;

    impl Migration for BrokenAfterCreate {
        fn version(&self) -> u32 {
            3
        }

        fn description(&self) -> &'static str {
            "Creates a table, then fails"
        }

        fn up(&self, conn: &Connection) -> Result<()> {
            conn.execute_batch("CREATE TABLE half_done (id INTEGER PRIMARY KEY);")?;
            Err(PricewiseError::ConfigError("boom".to_string()))
        }
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1")
            .unwrap()
            .exists([name])
            .unwrap()
    }

    #[test]
    fn test_pending_migrations_apply_in_version_order() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pending(&conn, vec![Box::new(AddNotes), Box::new(v1_initial::V1Initial)]).unwrap();

        assert_eq!(get_applied_versions(&conn).unwrap(), vec![1, 2]);
        assert!(table_exists(&conn, "notes"));
    }

    #[test]
    fn test_failed_migration_rolls_back_its_step_only() {
        let conn = Connection::open_in_memory().unwrap();
        let result = apply_pending(
            &conn,
            vec![
                Box::new(v1_initial::V1Initial),
                Box::new(AddNotes),
                Box::new(BrokenAfterCreate),
            ],
        );

        assert!(result.is_err());
        assert_eq!(get_applied_versions(&conn).unwrap(), vec![1, 2]);
        assert!(table_exists(&conn, "notes"));
        assert!(!table_exists(&conn, "half_done"));
    }

    #[test]
    fn test_rerun_skips_recorded_versions() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        apply_pending(&conn, vec![Box::new(v1_initial::V1Initial), Box::new(AddNotes)]).unwrap();
        run_migrations(&conn).unwrap();

        assert_eq!(get_applied_versions(&conn).unwrap(), vec![1, 2]);
    }
}
