//! Brings `articles.slug` to its terminal state: present, filled, uniquely constrained.
//!
//! SQLite refuses `ALTER TABLE ... ADD COLUMN ... UNIQUE` and cannot attach a constraint
//! to an existing column, so the work is split into resumable steps:
//!
//! 1. inspect the column set and constraint metadata
//! 2. add `slug` as a plain nullable column when it is missing
//! 3. backfill empty or duplicated slugs in id order, committing once
//! 4. rebuild the table with `slug TEXT UNIQUE` in a single transaction
//! 5. recreate the lookup indexes the rebuild dropped
//!
//! Every step checks the live schema before acting, so a run interrupted at any point
//! picks up where it stopped, and a run against an already-migrated table changes nothing.

use super::schema::{self, quote_ident, SlugColumnState, ARTICLES_TABLE, SLUG_COLUMN};
use super::Database;
use crate::error::{MigrationError, MigrationStage};
use crate::services::slug::{base_slug, generate_slug, make_unique_among};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use std::collections::HashSet;

pub fn articles_table_ddl(name: &str) -> String {
    format!(
        r#"CREATE TABLE {} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    subtitle TEXT,
    body TEXT NOT NULL,
    category TEXT NOT NULL,
    author TEXT NOT NULL,
    author_id INTEGER,
    image_url TEXT,
    status TEXT NOT NULL DEFAULT 'published' CHECK(status IN ('draft', 'published', 'archived')),
    tags TEXT,
    featured INTEGER NOT NULL DEFAULT 0,
    source TEXT,
    views INTEGER NOT NULL DEFAULT 0,
    newsletter_sent INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
    slug TEXT UNIQUE
)"#,
        quote_ident(name)
    )
}

const ARTICLE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_articles_slug ON articles(slug);
CREATE INDEX IF NOT EXISTS idx_articles_category ON articles(category);
CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status);
CREATE INDEX IF NOT EXISTS idx_articles_featured ON articles(featured) WHERE featured = 1;
CREATE INDEX IF NOT EXISTS idx_articles_created ON articles(created_at DESC);
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub initial_state: SlugColumnState,
    pub column_added: bool,
    pub backfilled: usize,
    pub rebuilt: bool,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        !self.column_added && self.backfilled == 0 && !self.rebuilt
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlugAssignment {
    pub id: i64,
    pub slug: String,
}

struct StoredRow {
    id: i64,
    title: String,
    slug: Option<String>,
}

pub struct SlugMigrator<'a> {
    db: &'a Database,
}

impl<'a> SlugMigrator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn run(&self) -> Result<MigrationReport, MigrationError> {
        let mut conn = self.db.get()?;

        let initial_state = schema::slug_column_state(&conn)
            .map_err(|e| fail(MigrationStage::Inspect, e))?;
        tracing::debug!(state = ?initial_state, "Inspected article slug column");

        let mut report = MigrationReport {
            initial_state,
            column_added: false,
            backfilled: 0,
            rebuilt: false,
        };

        if initial_state == SlugColumnState::Absent {
            add_slug_column(&conn).map_err(|e| fail(MigrationStage::AddColumn, e))?;
            report.column_added = true;
        }

        report.backfilled = backfill(&mut conn).map_err(|e| fail(MigrationStage::Backfill, e))?;

        if initial_state != SlugColumnState::Unique {
            rebuild_with_unique_slug(&mut conn)?;
            report.rebuilt = true;
        }

        if let Err(e) = conn.execute_batch(ARTICLE_INDEXES) {
            tracing::warn!(error = %e, "Failed to refresh article indexes");
        }

        if report.is_noop() {
            tracing::debug!("Article slugs already migrated");
        } else {
            tracing::info!(
                column_added = report.column_added,
                backfilled = report.backfilled,
                rebuilt = report.rebuilt,
                "Article slug migration complete"
            );
        }

        Ok(report)
    }

    /// Computes the slugs step 3 would write, without touching the database.
    pub fn plan(&self) -> Result<Vec<SlugAssignment>, MigrationError> {
        let conn = self.db.get()?;
        let rows = load_rows(&conn).map_err(|e| fail(MigrationStage::Inspect, e))?;
        Ok(plan_assignments(rows))
    }
}

fn fail(stage: MigrationStage, err: impl std::fmt::Display) -> MigrationError {
    tracing::error!(%stage, error = %err, "Article slug migration step failed");
    MigrationError::incomplete(stage, err)
}

fn add_slug_column(conn: &Connection) -> rusqlite::Result<()> {
    tracing::info!("Adding slug column to articles");
    conn.execute_batch("ALTER TABLE articles ADD COLUMN slug TEXT")
}

fn load_rows(conn: &Connection) -> rusqlite::Result<Vec<StoredRow>> {
    let sql = if schema::has_column(conn, ARTICLES_TABLE, SLUG_COLUMN)? {
        "SELECT id, title, slug FROM articles ORDER BY id"
    } else {
        "SELECT id, title, NULL FROM articles ORDER BY id"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StoredRow {
                id: row.get(0)?,
                title: row.get(1)?,
                slug: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// The first row (by id) holding a slug keeps it; later holders of the same value and rows
// without one are re-derived and suffixed against everything already taken.
fn plan_assignments(rows: Vec<StoredRow>) -> Vec<SlugAssignment> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut pending: Vec<(i64, String)> = Vec::new();

    for row in rows {
        match row.slug.filter(|s| !s.trim().is_empty()) {
            Some(slug) if !taken.contains(&slug) => {
                taken.insert(slug);
            }
            Some(slug) => pending.push((row.id, base_slug(&row.title, Some(slug.as_str())))),
            None => pending.push((row.id, generate_slug(&row.title))),
        }
    }

    pending
        .into_iter()
        .map(|(id, base)| {
            let slug = make_unique_among(&base, &taken);
            taken.insert(slug.clone());
            SlugAssignment { id, slug }
        })
        .collect()
}

fn backfill(conn: &mut Connection) -> rusqlite::Result<usize> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let plan = plan_assignments(load_rows(&tx)?);

    if plan.is_empty() {
        return Ok(0);
    }

    tracing::info!(rows = plan.len(), "Backfilling article slugs");
    {
        let mut stmt = tx.prepare("UPDATE articles SET slug = ?1 WHERE id = ?2")?;
        for assignment in &plan {
            stmt.execute((&assignment.slug, assignment.id))?;
        }
    }
    tx.commit()?;

    Ok(plan.len())
}

fn rebuild_with_unique_slug(conn: &mut Connection) -> Result<(), MigrationError> {
    tracing::info!("Rebuilding articles with a unique slug constraint");

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| fail(MigrationStage::Rebuild, e))?;

    let copied = schema::rebuild_table(&tx, ARTICLES_TABLE, articles_table_ddl)
        .map_err(|e| fail(MigrationStage::Rebuild, e))?;

    let state = schema::slug_column_state(&tx).map_err(|e| fail(MigrationStage::Rebuild, e))?;
    if state != SlugColumnState::Unique {
        return Err(fail(
            MigrationStage::Rebuild,
            format!("slug column is {:?} after rebuild", state),
        ));
    }

    tx.commit().map_err(|e| fail(MigrationStage::Rebuild, e))?;
    tracing::info!(rows = copied, "Articles table rebuilt");
    Ok(())
}
