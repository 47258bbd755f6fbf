use crate::error::{StoreError, StoreResult};
use crate::models::{
    Article, ArticleFilter, ArticleStatus, CategoryCount, CreateArticle, UpdateArticle,
};
use crate::services::slug::{base_slug, make_unique};
use crate::Database;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};

/// Total tries for a create whose slug was claimed by a concurrent writer in between.
const CREATE_ATTEMPTS: u32 = 2;

const ARTICLE_COLUMNS: &str = "id, slug, title, subtitle, body, category, author, author_id, image_url, status, tags, featured, source, views, created_at, updated_at";

/// True when `slug` belongs to an article other than `exclude_id`.
fn slug_taken(conn: &Connection, slug: &str, exclude_id: Option<i64>) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM articles WHERE slug = ?1 AND (?2 IS NULL OR id != ?2))",
        (slug, exclude_id),
        |row| row.get(0),
    )
}

fn resolve_slug(
    conn: &Connection,
    title: &str,
    requested: Option<&str>,
    exclude_id: Option<i64>,
) -> rusqlite::Result<String> {
    let base = base_slug(title, requested);
    make_unique(&base, |candidate| slug_taken(conn, candidate, exclude_id))
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn check_required(input: &CreateArticle) -> StoreResult<()> {
    let missing: Vec<&'static str> = [
        ("title", input.title.as_str()),
        ("body", input.body.as_str()),
        ("category", input.category.as_str()),
        ("author", input.author.as_str()),
    ]
    .into_iter()
    .filter(|(_, value)| blank(value))
    .map(|(field, _)| field)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StoreError::MissingField(missing))
    }
}

pub fn create_article(
    db: &Database,
    input: CreateArticle,
    author_id: Option<i64>,
) -> StoreResult<Article> {
    check_required(&input)?;

    let mut conn = db.get()?;
    let article = retry_on_slug_conflict(|_| insert_article(&mut conn, &input, author_id))?;
    tracing::info!(id = article.id, slug = %article.slug, "Article created");
    Ok(article)
}

/// Runs `create` again when it lost its slug to a concurrent writer, up to
/// `CREATE_ATTEMPTS` times in total. `create` receives the 1-based attempt number.
fn retry_on_slug_conflict<T>(mut create: impl FnMut(u32) -> StoreResult<T>) -> StoreResult<T> {
    let mut attempt = 1;
    loop {
        match create(attempt) {
            Err(StoreError::DuplicateSlug(slug)) if attempt < CREATE_ATTEMPTS => {
                tracing::warn!(%slug, attempt, "Slug claimed concurrently, regenerating");
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

fn insert_article(
    conn: &mut Connection,
    input: &CreateArticle,
    author_id: Option<i64>,
) -> StoreResult<Article> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let slug = resolve_slug(&tx, input.title.trim(), input.slug.as_deref(), None)?;
    let article = insert_with_slug(&tx, input, author_id, &slug)?;
    tx.commit()?;
    Ok(article)
}

fn insert_with_slug(
    conn: &Connection,
    input: &CreateArticle,
    author_id: Option<i64>,
    slug: &str,
) -> StoreResult<Article> {
    let inserted = conn.execute(
        r#"
        INSERT INTO articles (slug, title, subtitle, body, category, author, author_id, image_url, status, tags, featured, source)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        (
            slug,
            input.title.trim(),
            &input.subtitle,
            &input.body,
            input.category.trim(),
            input.author.trim(),
            author_id,
            &input.image_url,
            input.status.unwrap_or(ArticleStatus::Published).to_string(),
            &input.tags,
            input.featured,
            &input.source,
        ),
    );
    match inserted {
        Ok(_) => {}
        Err(e) if StoreError::is_slug_conflict(&e) => {
            return Err(StoreError::DuplicateSlug(slug.to_string()))
        }
        Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    fetch_by_id(conn, id)?.ok_or(StoreError::NotFound)
}

/// Applies the given fields; absent ones keep their stored value.
///
/// A requested slug that another article holds is disambiguated rather than rejected.
/// Without a requested slug the stored one is left alone, even when the title changes.
pub fn update_article(db: &Database, id: i64, input: UpdateArticle) -> StoreResult<Article> {
    let blank_fields: Vec<&'static str> = [
        ("title", input.title.as_deref()),
        ("body", input.body.as_deref()),
        ("category", input.category.as_deref()),
        ("author", input.author.as_deref()),
    ]
    .into_iter()
    .filter(|(_, value)| value.is_some_and(blank))
    .map(|(field, _)| field)
    .collect();
    if !blank_fields.is_empty() {
        return Err(StoreError::MissingField(blank_fields));
    }

    let mut conn = db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = fetch_by_id(&tx, id)?.ok_or(StoreError::NotFound)?;

    let requested = input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let slug = match requested {
        Some(requested) => {
            let resolved = resolve_slug(&tx, &current.title, Some(requested), Some(id))?;
            if resolved != requested {
                tracing::info!(id, requested, resolved = %resolved, "Requested slug adjusted");
            }
            resolved
        }
        None => current.slug.clone(),
    };

    let title = input.title.map(|t| t.trim().to_string()).unwrap_or(current.title);
    let body = input.body.unwrap_or(current.body);
    let category = input
        .category
        .map(|c| c.trim().to_string())
        .unwrap_or(current.category);
    let author = input.author.map(|a| a.trim().to_string()).unwrap_or(current.author);
    let status = input.status.unwrap_or(current.status);
    let featured = input.featured.unwrap_or(current.featured);

    let updated = tx.execute(
        r#"
        UPDATE articles SET slug = ?, title = ?, subtitle = ?, body = ?, category = ?, author = ?, image_url = ?,
            status = ?, tags = ?, featured = ?, source = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
        (
            &slug,
            &title,
            input.subtitle.unwrap_or(current.subtitle),
            &body,
            &category,
            &author,
            input.image_url.unwrap_or(current.image_url),
            status.to_string(),
            input.tags.unwrap_or(current.tags),
            featured,
            input.source.unwrap_or(current.source),
            id,
        ),
    );
    match updated {
        Ok(_) => {}
        Err(e) if StoreError::is_slug_conflict(&e) => return Err(StoreError::DuplicateSlug(slug)),
        Err(e) => return Err(e.into()),
    }

    let article = fetch_by_id(&tx, id)?.ok_or(StoreError::NotFound)?;
    tx.commit()?;
    Ok(article)
}

/// Looks an article up by slug and counts the read as a view.
///
/// The increment and the read are one statement, so the returned view count already
/// includes this hit.
pub fn find_by_slug(db: &Database, slug: &str) -> StoreResult<Option<Article>> {
    let conn = db.get()?;
    let article = conn
        .query_row(
            &format!(
                "UPDATE articles SET views = views + 1 WHERE slug = ?1 RETURNING {}",
                ARTICLE_COLUMNS
            ),
            [slug],
            row_to_article,
        )
        .optional()?;
    Ok(article)
}

pub fn get_by_id(db: &Database, id: i64) -> StoreResult<Option<Article>> {
    let conn = db.get()?;
    Ok(fetch_by_id(&conn, id)?)
}

fn fetch_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<Article>> {
    conn.query_row(
        &format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS),
        [id],
        row_to_article,
    )
    .optional()
}

fn filter_clause(filter: &ArticleFilter) -> (String, Vec<String>) {
    let mut sql = String::from(" WHERE 1=1");
    let mut params: Vec<String> = Vec::new();

    if let Some(category) = &filter.category {
        sql.push_str(" AND category = ?");
        params.push(category.clone());
    }
    if let Some(status) = filter.status {
        sql.push_str(" AND status = ?");
        params.push(status.to_string());
    }
    (sql, params)
}

pub fn list_articles(
    db: &Database,
    filter: &ArticleFilter,
    limit: usize,
    offset: usize,
) -> StoreResult<Vec<Article>> {
    let conn = db.get()?;
    let (clause, params) = filter_clause(filter);
    let sql = format!(
        "SELECT {} FROM articles{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        ARTICLE_COLUMNS, clause
    );

    let param_refs: Vec<&dyn rusqlite::ToSql> = params
        .iter()
        .map(|s| s as &dyn rusqlite::ToSql)
        .chain(std::iter::once(&limit as &dyn rusqlite::ToSql))
        .chain(std::iter::once(&offset as &dyn rusqlite::ToSql))
        .collect();

    let mut stmt = conn.prepare(&sql)?;
    let articles = stmt
        .query_map(param_refs.as_slice(), row_to_article)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(articles)
}

pub fn count_articles(db: &Database, filter: &ArticleFilter) -> StoreResult<i64> {
    let conn = db.get()?;
    let (clause, params) = filter_clause(filter);
    let param_refs: Vec<&dyn rusqlite::ToSql> =
        params.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
    let count = conn.query_row(
        &format!("SELECT COUNT(*) FROM articles{}", clause),
        param_refs.as_slice(),
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn featured_articles(db: &Database, limit: usize) -> StoreResult<Vec<Article>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM articles WHERE featured = 1 AND status = 'published' ORDER BY created_at DESC, id DESC LIMIT ?",
        ARTICLE_COLUMNS
    ))?;
    let articles = stmt
        .query_map([limit], row_to_article)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(articles)
}

pub fn search_articles(db: &Database, query: &str, limit: usize) -> StoreResult<Vec<Article>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let pattern = format!("%{}%", query);
    let conn = db.get()?;
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {} FROM articles
        WHERE status = 'published'
          AND (title LIKE ?1 OR subtitle LIKE ?1 OR body LIKE ?1 OR tags LIKE ?1)
        ORDER BY created_at DESC, id DESC LIMIT ?2
        "#,
        ARTICLE_COLUMNS
    ))?;
    let articles = stmt
        .query_map((&pattern, limit), row_to_article)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(articles)
}

/// Takes an article out of circulation. The row stays, and so does its slug.
pub fn archive_article(db: &Database, id: i64) -> StoreResult<bool> {
    let conn = db.get()?;
    let changed = conn.execute(
        "UPDATE articles SET status = 'archived', updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        [id],
    )?;
    if changed > 0 {
        tracing::info!(id, "Article archived");
    }
    Ok(changed > 0)
}

pub fn count_by_category(db: &Database) -> StoreResult<Vec<CategoryCount>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(
        "SELECT category, COUNT(*) FROM articles WHERE status = 'published' GROUP BY category ORDER BY COUNT(*) DESC, category",
    )?;
    let counts = stmt
        .query_map([], |row| {
            Ok(CategoryCount {
                category: row.get(0)?,
                total: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(counts)
}

fn row_to_article(row: &rusqlite::Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        slug: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        title: row.get(2)?,
        subtitle: row.get(3)?,
        body: row.get(4)?,
        category: row.get(5)?,
        author: row.get(6)?,
        author_id: row.get(7)?,
        image_url: row.get(8)?,
        status: row
            .get::<_, String>(9)?
            .parse()
            .unwrap_or(ArticleStatus::Draft),
        tags: row.get(10)?,
        featured: row.get(11)?,
        source: row.get(12)?,
        views: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}
