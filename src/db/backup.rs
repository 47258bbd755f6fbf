//! Whole-database export and import.
//!
//! An import is copied next to the live file and migrated there before it replaces
//! anything, so a backup taken before articles had slugs comes back with its slug column
//! already constrained. A file that cannot be migrated never reaches the live path.

use crate::db::schema::{self, ARTICLES_TABLE};
use crate::db::{Database, MigrationReport};
use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub const IMPORT_EXTENSIONS: [&str; 3] = ["db", "sqlite", "sqlite3"];

#[derive(Debug)]
pub struct ImportReport {
    /// Copy of the database that was replaced, if there was one.
    pub previous: Option<PathBuf>,
    pub migration: MigrationReport,
    pub articles: i64,
}

pub fn backup_file_name(prefix: &str) -> String {
    format!(
        "{}-{}.db",
        prefix,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// Writes a consistent copy of `db` to `dest`. `dest` must not exist yet.
pub fn export(db: &Database, dest: &Path) -> Result<()> {
    if dest.exists() {
        bail!("Refusing to overwrite {}", dest.display());
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let conn = db.get()?;
    conn.execute_batch("PRAGMA wal_checkpoint(FULL);")?;
    conn.execute("VACUUM INTO ?", [dest.to_string_lossy().to_string()])
        .with_context(|| format!("Failed to write {}", dest.display()))?;

    tracing::info!(path = %dest.display(), "Database exported");
    Ok(())
}

/// Replaces the database file at `target` with the SQLite file at `source`.
///
/// The current database, when present, is exported to `backup_dir` first.
pub fn import(source: &Path, target: &Path, backup_dir: &Path) -> Result<ImportReport> {
    check_import_file(source)?;

    let staging = target.with_extension("importing");
    remove_with_sidecars(&staging)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, &staging)
        .with_context(|| format!("Failed to copy {}", source.display()))?;

    let (migration, articles) = match migrate_staged(&staging) {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Err(cleanup) = remove_with_sidecars(&staging) {
                tracing::warn!(error = %cleanup, "Failed to remove staged import");
            }
            return Err(e.context("Imported database could not be migrated; nothing was replaced"));
        }
    };

    let previous = if target.exists() {
        let path = backup_dir.join(backup_file_name("pre-import-backup"));
        let current = Database::open_with_pool_size(&target.to_string_lossy(), 1)?;
        export(&current, &path)?;
        current.close();
        Some(path)
    } else {
        None
    };

    remove_with_sidecars(target)?;
    fs::rename(&staging, target)?;
    remove_with_sidecars(&staging)?;

    tracing::info!(
        source = %source.display(),
        target = %target.display(),
        articles,
        "Database imported"
    );
    Ok(ImportReport {
        previous,
        migration,
        articles,
    })
}

fn check_import_file(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !IMPORT_EXTENSIONS.contains(&ext.as_str()) {
        bail!(
            "Unsupported file {}: expected .db, .sqlite or .sqlite3",
            path.display()
        );
    }
    if !path.is_file() {
        bail!("Import file not found: {}", path.display());
    }

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Cannot open {}", path.display()))?;
    let has_articles = schema::table_exists(&conn, ARTICLES_TABLE)
        .with_context(|| format!("{} is not a SQLite database", path.display()))?;
    if !has_articles {
        bail!("{} has no articles table", path.display());
    }
    Ok(())
}

fn migrate_staged(path: &Path) -> Result<(MigrationReport, i64)> {
    let db = Database::open_with_pool_size(&path.to_string_lossy(), 1)?;
    let report = db.migrate()?;
    let articles = {
        let conn = db.get()?;
        let count = schema::count_rows(&conn, ARTICLES_TABLE)?;
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        count
    };
    db.close();
    Ok((report, articles))
}

fn remove_with_sidecars(path: &Path) -> Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let mut name = OsString::from(path.as_os_str());
        name.push(suffix);
        match fs::remove_file(&name) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
