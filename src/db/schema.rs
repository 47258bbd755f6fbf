//! Table introspection and the rebuild maneuver SQLite needs to tighten a column's
//! constraints in place.

use rusqlite::Connection;
use serde::Serialize;

pub const ARTICLES_TABLE: &str = "articles";
pub const SLUG_COLUMN: &str = "slug";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

/// The three shapes the article table can be found in at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlugColumnState {
    /// No slug column at all.
    Absent,
    /// Column present but not covered by a unique index; values may be null or repeated.
    Unconstrained,
    /// Column present and uniquely constrained.
    Unique,
}

#[derive(Debug, thiserror::Error)]
pub enum RebuildError {
    #[error("column '{0}' has no counterpart in the rebuilt table")]
    DroppedColumn(String),

    #[error("table '{0}' does not exist")]
    MissingTable(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [table],
        |row| row.get(0),
    )
}

pub fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(
        r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid"#,
    )?;
    let columns = stmt
        .query_map([table], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                decl_type: row.get(1)?,
                not_null: row.get(2)?,
                default: row.get(3)?,
                primary_key: row.get::<_, i64>(4)? > 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

pub fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    Ok(table_columns(conn, table)?
        .iter()
        .any(|c| c.name.eq_ignore_ascii_case(column)))
}

/// True when a full (non-partial) unique index covers exactly `column`.
pub fn has_unique_index_on(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut list = conn.prepare(
        r#"SELECT name FROM pragma_index_list(?1) WHERE "unique" = 1 AND partial = 0"#,
    )?;
    let indexes: Vec<String> = list
        .query_map([table], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut info = conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
    for index in indexes {
        let columns: Vec<Option<String>> = info
            .query_map([&index], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        if let [Some(only)] = columns.as_slice() {
            if only.eq_ignore_ascii_case(column) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

pub fn slug_column_state(conn: &Connection) -> rusqlite::Result<SlugColumnState> {
    if !has_column(conn, ARTICLES_TABLE, SLUG_COLUMN)? {
        return Ok(SlugColumnState::Absent);
    }
    if has_unique_index_on(conn, ARTICLES_TABLE, SLUG_COLUMN)? {
        Ok(SlugColumnState::Unique)
    } else {
        Ok(SlugColumnState::Unconstrained)
    }
}

/// Replaces `table` with a fresh table built from `create_sql(name)`, carrying every row.
///
/// Must be called inside a transaction so a failure leaves the original table untouched.
/// Refuses to run when the live table has a column the new definition lacks. Indexes on
/// the old table are dropped with it and have to be recreated by the caller.
pub fn rebuild_table<F>(conn: &Connection, table: &str, create_sql: F) -> Result<usize, RebuildError>
where
    F: Fn(&str) -> String,
{
    let old_columns = table_columns(conn, table)?;
    if old_columns.is_empty() {
        return Err(RebuildError::MissingTable(table.to_string()));
    }

    let staging = format!("{}_rebuild", table);
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(&staging)))?;
    conn.execute_batch(&create_sql(&staging))?;

    let new_columns = table_columns(conn, &staging)?;
    if let Some(missing) = old_columns
        .iter()
        .find(|old| !new_columns.iter().any(|new| new.name.eq_ignore_ascii_case(&old.name)))
    {
        return Err(RebuildError::DroppedColumn(missing.name.clone()));
    }

    let column_list = old_columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let copied = conn.execute(
        &format!(
            "INSERT INTO {staging} ({cols}) SELECT {cols} FROM {table} ORDER BY rowid",
            staging = quote_ident(&staging),
            cols = column_list,
            table = quote_ident(table),
        ),
        [],
    )?;

    carry_autoincrement(conn, table, &staging)?;

    conn.execute_batch(&format!(
        "DROP TABLE {table}; ALTER TABLE {staging} RENAME TO {table};",
        table = quote_ident(table),
        staging = quote_ident(&staging),
    ))?;

    Ok(copied)
}

// Keeps AUTOINCREMENT from handing out ids of rows deleted before the rebuild.
fn carry_autoincrement(conn: &Connection, from: &str, to: &str) -> rusqlite::Result<()> {
    if !table_exists(conn, "sqlite_sequence")? {
        return Ok(());
    }
    conn.execute(
        "UPDATE sqlite_sequence
         SET seq = MAX(seq, COALESCE((SELECT seq FROM sqlite_sequence WHERE name = ?1), 0))
         WHERE name = ?2",
        (from, to),
    )?;
    conn.execute(
        "INSERT INTO sqlite_sequence (name, seq)
         SELECT ?2, seq FROM sqlite_sequence
         WHERE name = ?1 AND NOT EXISTS (SELECT 1 FROM sqlite_sequence WHERE name = ?2)",
        (from, to),
    )?;
    Ok(())
}

pub fn count_rows(conn: &Connection, table: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
        [],
        |row| row.get(0),
    )
}
