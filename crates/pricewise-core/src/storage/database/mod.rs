mod connection;
mod migrations;
mod schema;

pub use connection::ConnectionPool;
pub use migrations::{get_applied_versions, run_migrations, Migration};
pub use schema::SCHEMA_VERSION;

use std::path::Path;

use crate::error::Result;

pub fn open_database(path: &Path) -> Result<ConnectionPool> {
    let pool = ConnectionPool::open(path)?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

pub fn open_in_memory() -> Result<ConnectionPool> {
    let pool = ConnectionPool::open_in_memory()?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_recorded_once() {
        let pool = open_in_memory().unwrap();
        let conn = pool.get_connection();
        run_migrations(&conn).unwrap();
        assert_eq!(get_applied_versions(&conn).unwrap(), vec![SCHEMA_VERSION]);
    }

    #[test]
    fn test_open_file_database_creates_parent_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("catalog.db");
        let pool = open_database(&path).unwrap();
        assert!(!pool.is_in_memory());
        assert!(path.exists());
    }
}
