use crate::error::{StoreError, StoreResult};
use crate::models::{Subscriber, SubscriberFilter, SubscriberStatus, Subscription};
use crate::services::auth::generate_token;
use crate::Database;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid regex")
});

const SUBSCRIBER_COLUMNS: &str =
    "id, email, name, confirmation_code, confirmed, status, created_at, last_sent, total_sent";

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Registers an address for the newsletter.
///
/// Unconfirmed and cancelled addresses get a fresh confirmation code; an address that is
/// already confirmed and active is left alone.
pub fn subscribe(db: &Database, email: &str, name: Option<&str>) -> StoreResult<Subscription> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(StoreError::MissingField(vec!["email"]));
    }
    if !is_valid_email(&email) {
        return Err(StoreError::validation("Invalid email address"));
    }
    let name = name.map(str::trim).filter(|n| !n.is_empty());

    let conn = db.get()?;
    let code = generate_token();

    let outcome = match fetch_by_email(&conn, &email)? {
        Some(existing) if existing.status == SubscriberStatus::Cancelled => {
            conn.execute(
                r#"
                UPDATE subscribers SET status = 'active', confirmed = 0, confirmation_code = ?,
                    name = COALESCE(?, name), updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                "#,
                (&code, name, existing.id),
            )?;
            Subscription::Reactivated(reload(&conn, existing.id)?)
        }
        Some(existing) if existing.confirmed => Subscription::AlreadySubscribed,
        Some(existing) => {
            conn.execute(
                r#"
                UPDATE subscribers SET status = 'active', confirmation_code = ?,
                    name = COALESCE(?, name), updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                "#,
                (&code, name, existing.id),
            )?;
            Subscription::Pending(reload(&conn, existing.id)?)
        }
        None => {
            conn.execute(
                "INSERT INTO subscribers (email, name, confirmation_code) VALUES (?, ?, ?)",
                (&email, name, &code),
            )?;
            Subscription::Pending(reload(&conn, conn.last_insert_rowid())?)
        }
    };

    tracing::info!(email = %email, outcome = outcome_label(&outcome), "Newsletter subscription");
    Ok(outcome)
}

fn outcome_label(outcome: &Subscription) -> &'static str {
    match outcome {
        Subscription::Pending(_) => "pending",
        Subscription::Reactivated(_) => "reactivated",
        Subscription::AlreadySubscribed => "already_subscribed",
    }
}

/// Confirms the subscription holding `code`. Codes are single use.
pub fn confirm(db: &Database, code: &str) -> StoreResult<Option<Subscriber>> {
    let code = code.trim();
    if code.is_empty() {
        return Ok(None);
    }
    let conn = db.get()?;
    let subscriber = conn
        .query_row(
            &format!(
                r#"
                UPDATE subscribers SET confirmed = 1, status = 'active', confirmation_code = NULL,
                    updated_at = CURRENT_TIMESTAMP
                WHERE confirmation_code = ?1
                RETURNING {}
                "#,
                SUBSCRIBER_COLUMNS
            ),
            [code],
            row_to_subscriber,
        )
        .optional()?;
    Ok(subscriber)
}

/// Marks the address cancelled. Returns false when no active subscription exists.
pub fn unsubscribe(db: &Database, email: &str) -> StoreResult<bool> {
    let email = email.trim().to_lowercase();
    let conn = db.get()?;
    let changed = conn.execute(
        "UPDATE subscribers SET status = 'cancelled', updated_at = CURRENT_TIMESTAMP WHERE email = ? AND status != 'cancelled'",
        [&email],
    )?;
    if changed > 0 {
        tracing::info!(email = %email, "Newsletter subscription cancelled");
    }
    Ok(changed > 0)
}

pub fn get_subscriber_by_email(db: &Database, email: &str) -> StoreResult<Option<Subscriber>> {
    let conn = db.get()?;
    Ok(fetch_by_email(&conn, &email.trim().to_lowercase())?)
}

fn filter_clause(filter: &SubscriberFilter) -> (String, Vec<String>) {
    let mut sql = String::from(" WHERE 1=1");
    let mut params: Vec<String> = Vec::new();

    if let Some(status) = filter.status {
        sql.push_str(" AND status = ?");
        params.push(status.to_string());
    }
    if let Some(confirmed) = filter.confirmed {
        sql.push_str(if confirmed {
            " AND confirmed = 1"
        } else {
            " AND confirmed = 0"
        });
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        sql.push_str(" AND (email LIKE ? OR name LIKE ?)");
        let pattern = format!("%{}%", q);
        params.push(pattern.clone());
        params.push(pattern);
    }
    (sql, params)
}

pub fn list_subscribers(
    db: &Database,
    filter: &SubscriberFilter,
    limit: usize,
    offset: usize,
) -> StoreResult<Vec<Subscriber>> {
    let conn = db.get()?;
    let (clause, params) = filter_clause(filter);
    let sql = format!(
        "SELECT {} FROM subscribers{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        SUBSCRIBER_COLUMNS, clause
    );

    let param_refs: Vec<&dyn rusqlite::ToSql> = params
        .iter()
        .map(|s| s as &dyn rusqlite::ToSql)
        .chain(std::iter::once(&limit as &dyn rusqlite::ToSql))
        .chain(std::iter::once(&offset as &dyn rusqlite::ToSql))
        .collect();

    let mut stmt = conn.prepare(&sql)?;
    let subscribers = stmt
        .query_map(param_refs.as_slice(), row_to_subscriber)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(subscribers)
}

pub fn count_subscribers(db: &Database, filter: &SubscriberFilter) -> StoreResult<i64> {
    let conn = db.get()?;
    let (clause, params) = filter_clause(filter);
    let param_refs: Vec<&dyn rusqlite::ToSql> =
        params.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
    let count = conn.query_row(
        &format!("SELECT COUNT(*) FROM subscribers{}", clause),
        param_refs.as_slice(),
        |row| row.get(0),
    )?;
    Ok(count)
}

fn fetch_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<Subscriber>> {
    conn.query_row(
        &format!("SELECT {} FROM subscribers WHERE email = ?", SUBSCRIBER_COLUMNS),
        [email],
        row_to_subscriber,
    )
    .optional()
}

fn reload(conn: &Connection, id: i64) -> StoreResult<Subscriber> {
    conn.query_row(
        &format!("SELECT {} FROM subscribers WHERE id = ?", SUBSCRIBER_COLUMNS),
        [id],
        row_to_subscriber,
    )
    .optional()?
    .ok_or(StoreError::NotFound)
}

fn row_to_subscriber(row: &rusqlite::Row) -> rusqlite::Result<Subscriber> {
    Ok(Subscriber {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        confirmation_code: row.get(3)?,
        confirmed: row.get(4)?,
        status: row
            .get::<_, String>(5)?
            .parse()
            .unwrap_or(SubscriberStatus::Inactive),
        created_at: row.get(6)?,
        last_sent: row.get(7)?,
        total_sent: row.get(8)?,
    })
}
