pub mod backup;
pub mod schema;
pub mod slug_migration;

use anyhow::Result;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;

pub use slug_migration::{MigrationReport, SlugMigrator};

pub type DbPool = Pool<SqliteConnectionManager>;

pub struct Database {
    pool: DbPool,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self { pool: self.pool.clone() }
    }
}

fn init_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        Self::open_with_pool_size(path, 10)
    }

    pub fn open_with_pool_size(path: &str, pool_size: u32) -> Result<Self> {
        let path = Path::new(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(path).with_init(init_connection);
        let pool = Pool::builder().max_size(pool_size).build(manager)?;

        let conn = pool.get()?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Ok(Self { pool })
    }

    /// Opens a named in-memory database shared by every connection of the pool.
    pub fn open_memory(name: &str) -> Result<Self> {
        let uri = format!("file:{}?mode=memory&cache=shared", name);
        let manager = SqliteConnectionManager::file(uri)
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )
            .with_init(init_connection);
        let pool = Pool::builder().max_size(4).build(manager)?;
        Ok(Self { pool })
    }

    pub fn get(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, r2d2::Error> {
        self.pool.get()
    }

    /// Applies the base schema, then brings the article slug column to its constrained state.
    pub fn migrate(&self) -> Result<MigrationReport> {
        {
            let conn = self.get()?;
            run_migrations(&conn)?;
        }
        let report = SlugMigrator::new(self).run()?;
        Ok(report)
    }

    pub fn get_migration_status(&self) -> Result<Vec<(i32, Option<String>)>> {
        let conn = self.get()?;
        conn.execute_batch(SCHEMA_MIGRATIONS_DDL)?;

        let mut stmt = conn.prepare("SELECT version, applied_at FROM schema_migrations")?;
        let applied: Vec<(i32, Option<String>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MIGRATIONS
            .iter()
            .map(|(version, _)| {
                let applied_at = applied
                    .iter()
                    .find(|(v, _)| v == version)
                    .and_then(|(_, ts)| ts.clone());
                (*version, applied_at)
            })
            .collect())
    }

    pub fn close(self) {
        tracing::debug!(
            connections = self.pool.state().connections,
            "Closing database pool"
        );
        drop(self.pool);
    }
}

const SCHEMA_MIGRATIONS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT DEFAULT CURRENT_TIMESTAMP
);
"#;

pub const MIGRATIONS: [(i32, &str); 1] = [(1, include_str!("migrations/001_initial.sql"))];

pub const MIGRATION_DESCRIPTIONS: [&str; 1] =
    ["Core tables (users, sessions, articles, categories, subscribers)"];

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_MIGRATIONS_DDL)?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    for (version, sql) in MIGRATIONS {
        if version > current_version {
            tracing::info!("Running migration {}", version);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [version],
            )?;
        }
    }

    Ok(())
}
