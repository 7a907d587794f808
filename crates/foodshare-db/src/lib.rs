pub mod analytics;
pub mod announcements;
pub mod challenges;
pub mod donations;
pub mod feed;
pub mod filter;
pub mod migrations;
pub mod models;
pub mod reports;
pub mod stats;
pub mod users;

use anyhow::Result;
use rusqlite::OptionalExtension;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub use filter::{DateRange, Filter, ListQuery, PAGE_SIZE, Page};
pub use rusqlite::Connection;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fresh, fully migrated database that lives only as long as the handle.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}

/// Whether an optional feature table is present.
///
/// Pages backed by such tables degrade to empty results when it is not.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrated_schema_has_feature_tables() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            for table in [
                "user_accounts",
                "food_donations",
                "announcements",
                "challenges",
                "challenge_participants",
                "recipes_tips",
                "meal_plans",
            ] {
                assert!(table_exists(conn, table)?, "{table} missing");
            }
            assert!(!table_exists(conn, "nope")?);
            Ok(())
        })
        .unwrap();
    }
}
