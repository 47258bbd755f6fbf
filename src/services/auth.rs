use crate::error::StoreError;
use crate::models::{NewUser, UpdateUser, User, UserRole, UserStatus};
use crate::Database;
use anyhow::{bail, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use rusqlite::OptionalExtension;

pub const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_NAME_LENGTH: usize = 100;
const MAX_EMAIL_LENGTH: usize = 254;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, status, notes, created_at, updated_at, last_login";

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!(StoreError::MissingField(vec!["name"]));
    }
    if name.len() > MAX_NAME_LENGTH {
        bail!(StoreError::validation(format!(
            "Name must be {} characters or less",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() {
        bail!(StoreError::MissingField(vec!["email"]));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        bail!(StoreError::validation(format!(
            "Email must be {} characters or less",
            MAX_EMAIL_LENGTH
        )));
    }
    if !email.contains('@') || !email.contains('.') {
        bail!(StoreError::validation("Invalid email format"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LENGTH {
        bail!(StoreError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        bail!(StoreError::validation(
            "Password must contain at least one lowercase letter"
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        bail!(StoreError::validation(
            "Password must contain at least one uppercase letter"
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        bail!(StoreError::validation(
            "Password must contain at least one number"
        ));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String> {
    validate_password(password)?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$dW5rbm93bg$0000000000000000000000000000000000000000000";

pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => {
            if let Ok(dummy) = PasswordHash::new(DUMMY_HASH) {
                let _ = Argon2::default().verify_password(password.as_bytes(), &dummy);
            }
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// 32 random bytes, URL-safe base64. Used for session tokens and confirmation codes.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn is_email_conflict(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, msg) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                && msg.as_deref().is_some_and(|m| m.contains("users.email"))
        }
        _ => false,
    }
}

fn email_conflict(err: rusqlite::Error) -> anyhow::Error {
    if is_email_conflict(&err) {
        StoreError::validation("A user with this email already exists").into()
    } else {
        err.into()
    }
}

pub fn create_user(db: &Database, input: &NewUser) -> Result<User> {
    validate_name(&input.name)?;
    let email = input.email.trim().to_lowercase();
    validate_email(&email)?;
    let password_hash = hash_password(&input.password)?;

    let conn = db.get()?;
    conn.execute(
        "INSERT INTO users (name, email, password_hash, role, status, notes) VALUES (?, ?, ?, ?, ?, ?)",
        (
            input.name.trim(),
            &email,
            &password_hash,
            input.role.to_string(),
            input.status.to_string(),
            &input.notes,
        ),
    )
    .map_err(email_conflict)?;
    let id = conn.last_insert_rowid();
    drop(conn);

    tracing::info!(id, email = %email, role = %input.role, "User created");
    get_user(db, id)?.ok_or_else(|| StoreError::NotFound.into())
}

pub fn update_user(db: &Database, id: i64, input: &UpdateUser) -> Result<User> {
    let current = get_user(db, id)?.ok_or(StoreError::NotFound)?;

    let name = match &input.name {
        Some(name) => {
            validate_name(name)?;
            name.trim().to_string()
        }
        None => current.name,
    };
    let email = match &input.email {
        Some(email) => {
            validate_email(email.trim())?;
            email.trim().to_lowercase()
        }
        None => current.email,
    };
    let password_hash = match input.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => hash_password(password)?,
        None => current.password_hash,
    };

    let conn = db.get()?;
    conn.execute(
        r#"
        UPDATE users SET name = ?, email = ?, password_hash = ?, role = ?, status = ?, notes = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
        (
            &name,
            &email,
            &password_hash,
            input.role.unwrap_or(current.role).to_string(),
            input.status.unwrap_or(current.status).to_string(),
            input.notes.as_ref().or(current.notes.as_ref()),
            id,
        ),
    )
    .map_err(email_conflict)?;
    drop(conn);

    get_user(db, id)?.ok_or_else(|| StoreError::NotFound.into())
}

pub fn update_password(db: &Database, email: &str, password: &str) -> Result<()> {
    let password_hash = hash_password(password)?;
    let conn = db.get()?;
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?, updated_at = CURRENT_TIMESTAMP WHERE email = ?",
        (&password_hash, email.trim().to_lowercase()),
    )?;
    if changed == 0 {
        bail!(StoreError::NotFound);
    }
    Ok(())
}

/// Checks credentials for an active user and stamps `last_login` on success.
pub fn authenticate(db: &Database, email: &str, password: &str) -> Result<Option<User>> {
    let user = get_user_by_email(db, email.trim())?;

    match user {
        Some(u) if verify_password(password, &u.password_hash) => {
            if u.status != UserStatus::Active {
                tracing::info!(user_id = u.id, "Login refused for inactive user");
                return Ok(None);
            }
            let conn = db.get()?;
            conn.execute(
                "UPDATE users SET last_login = CURRENT_TIMESTAMP WHERE id = ?",
                [u.id],
            )?;
            Ok(Some(u))
        }
        _ => Ok(None),
    }
}

pub fn create_session(db: &Database, user_id: i64, duration_hours: i64) -> Result<String> {
    let token = generate_token();
    let conn = db.get()?;
    conn.execute(
        "INSERT INTO sessions (user_id, token, expires_at) VALUES (?, ?, datetime('now', ?||' hours'))",
        (user_id, &token, duration_hours),
    )?;
    Ok(token)
}

/// Resolves a session token to its user. Expired sessions and inactive users resolve to `None`.
pub fn validate_session(db: &Database, token: &str) -> Result<Option<User>> {
    let conn = db.get()?;
    let user = conn
        .query_row(
            r#"
            SELECT u.id, u.name, u.email, u.password_hash, u.role, u.status, u.notes,
                   u.created_at, u.updated_at, u.last_login
            FROM users u
            JOIN sessions s ON s.user_id = u.id
            WHERE s.token = ? AND s.expires_at > datetime('now') AND u.status = 'active'
            "#,
            [token],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn delete_session(db: &Database, token: &str) -> Result<()> {
    let conn = db.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?", [token])?;
    Ok(())
}

pub fn cleanup_expired_sessions(db: &Database) -> Result<usize> {
    let conn = db.get()?;
    let removed = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )?;
    Ok(removed)
}

pub fn has_users(db: &Database) -> Result<bool> {
    let conn = db.get()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count > 0)
}

pub fn list_users(db: &Database) -> Result<Vec<User>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY name COLLATE NOCASE",
        USER_COLUMNS
    ))?;
    let users = stmt
        .query_map([], row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn get_user(db: &Database, id: i64) -> Result<Option<User>> {
    let conn = db.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
            [id],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn get_user_by_email(db: &Database, email: &str) -> Result<Option<User>> {
    let conn = db.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
            [email.trim().to_lowercase()],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

/// Flips a user between active and inactive; returns the updated user.
pub fn toggle_user_status(db: &Database, id: i64) -> Result<Option<User>> {
    let Some(user) = get_user(db, id)? else {
        return Ok(None);
    };
    let status = user.status.toggled();
    {
        let conn = db.get()?;
        conn.execute(
            "UPDATE users SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            (status.to_string(), id),
        )?;
        if status == UserStatus::Inactive {
            conn.execute("DELETE FROM sessions WHERE user_id = ?", [id])?;
        }
    }
    tracing::info!(id, %status, "User status changed");
    get_user(db, id)
}

pub fn delete_user(db: &Database, id: i64) -> Result<bool> {
    let conn = db.get()?;
    let removed = conn.execute("DELETE FROM users WHERE id = ?", [id])?;
    Ok(removed > 0)
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: row
            .get::<_, String>(4)?
            .parse()
            .unwrap_or(UserRole::Journalist),
        status: row
            .get::<_, String>(5)?
            .parse()
            .unwrap_or(UserStatus::Inactive),
        notes: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        last_login: row.get(9)?,
    })
}
