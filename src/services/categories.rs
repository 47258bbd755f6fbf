use crate::error::StoreResult;
use crate::models::{Category, CategoryWithCount};
use crate::Database;
use rusqlite::OptionalExtension;

/// Visible categories in display order, each with its published article count.
pub fn list_categories(db: &Database) -> StoreResult<Vec<CategoryWithCount>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(
        r#"
        SELECT c.id, c.name, c.description, c.color, c.icon, c.position, c.visible,
               (SELECT COUNT(*) FROM articles a WHERE a.category = c.name AND a.status = 'published')
        FROM categories c
        WHERE c.visible = 1
        ORDER BY c.position, c.name
        "#,
    )?;
    let categories = stmt
        .query_map([], |row| {
            Ok(CategoryWithCount {
                category: row_to_category(row)?,
                total_articles: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

pub fn get_category_by_name(db: &Database, name: &str) -> StoreResult<Option<Category>> {
    let conn = db.get()?;
    let category = conn
        .query_row(
            "SELECT id, name, description, color, icon, position, visible FROM categories WHERE name = ? COLLATE NOCASE",
            [name],
            row_to_category,
        )
        .optional()?;
    Ok(category)
}

fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        color: row.get(3)?,
        icon: row.get(4)?,
        position: row.get(5)?,
        visible: row.get(6)?,
    })
}
