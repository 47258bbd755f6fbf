use std::fmt;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the data-access layer to route handlers.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingField(Vec<&'static str>),

    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("slug '{0}' is already taken")]
    DuplicateSlug(String),

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Pool(#[from] r2d2::Error),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True when the engine rejected a write because `articles.slug` already holds the value.
    pub fn is_slug_conflict(err: &rusqlite::Error) -> bool {
        match err {
            rusqlite::Error::SqliteFailure(e, msg) => {
                e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && msg.as_deref().is_some_and(|m| m.contains("articles.slug"))
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStage {
    Inspect,
    AddColumn,
    Backfill,
    Rebuild,
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inspect => write!(f, "inspect"),
            Self::AddColumn => write!(f, "add-column"),
            Self::Backfill => write!(f, "backfill"),
            Self::Rebuild => write!(f, "rebuild"),
        }
    }
}

/// The slug column could not be brought to its uniquely-constrained state.
/// The process must not start serving when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("slug migration incomplete at {stage}: {reason}")]
    Incomplete {
        stage: MigrationStage,
        reason: String,
    },

    #[error(transparent)]
    Pool(#[from] r2d2::Error),
}

impl MigrationError {
    pub fn incomplete(stage: MigrationStage, reason: impl fmt::Display) -> Self {
        Self::Incomplete {
            stage,
            reason: reason.to_string(),
        }
    }
}
