use crate::db::schema::{self, SlugColumnState, ARTICLES_TABLE, SLUG_COLUMN};
use crate::error::StoreResult;
use crate::Database;
use serde::Serialize;

const COUNTED_TABLES: [&str; 4] = ["users", "articles", "categories", "subscribers"];

#[derive(Debug, Serialize)]
pub struct SchemaHealth {
    pub slug_column_exists: bool,
    pub slug_unique_constraint: bool,
    pub slug_state: SlugColumnState,
    pub sqlite_version: String,
    pub tables: Vec<TableStats>,
}

impl SchemaHealth {
    pub fn is_healthy(&self) -> bool {
        self.slug_state == SlugColumnState::Unique
    }
}

#[derive(Debug, Serialize)]
pub struct TableStats {
    pub name: String,
    pub row_count: i64,
}

pub fn schema_health(db: &Database) -> StoreResult<SchemaHealth> {
    let conn = db.get()?;

    let slug_state = schema::slug_column_state(&conn)?;
    let sqlite_version: String = conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?;

    let mut tables = Vec::with_capacity(COUNTED_TABLES.len());
    for name in COUNTED_TABLES {
        if schema::table_exists(&conn, name)? {
            tables.push(TableStats {
                name: name.to_string(),
                row_count: schema::count_rows(&conn, name)?,
            });
        }
    }

    Ok(SchemaHealth {
        slug_column_exists: schema::has_column(&conn, ARTICLES_TABLE, SLUG_COLUMN)?,
        slug_unique_constraint: slug_state == SlugColumnState::Unique,
        slug_state,
        sqlite_version,
        tables,
    })
}
