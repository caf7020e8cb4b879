use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Password hashing error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("Item not found in database: {0}")]
    NotFound(String),
    #[error("Conflicting row already exists: {0}")]
    Conflict(String),
    #[error("Precondition failed: {0}")]
    Precondition(String),
}

// UNIQUE violations are surfaced as `Conflict` so callers can tell a duplicate
// slug or email apart from a broken database.
impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, ref msg) if err.code == ErrorCode::ConstraintViolation => {
                let detail = msg.clone().unwrap_or_else(|| err.to_string());
                if detail.contains("UNIQUE") {
                    DbError::Conflict(detail)
                } else {
                    DbError::Rusqlite(e)
                }
            }
            other => DbError::Rusqlite(other),
        }
    }
}

/// Maps "no rows" to the structured not-found signal.
pub(crate) fn not_found_as(what: &str) -> impl FnOnce(rusqlite::Error) -> DbError + '_ {
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(what.to_string()),
        other => DbError::from(other),
    }
}

pub mod posts_db_operations;
pub mod reports_db_operations;
pub mod submissions_db_operations;
pub mod users_db_operations;
