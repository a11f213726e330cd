use clubhouse_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unknown user")]
    UnknownUser,

    #[error("bad password")]
    BadPassword,

    #[error(transparent)]
    Store(#[from] DbError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session expired or unknown")]
    ExpiredOrUnknown,

    #[error(transparent)]
    Store(#[from] DbError),
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("secret code not recognized")]
    NotRecognized,

    #[error(transparent)]
    Store(#[from] DbError),
}

/// Failures of registration, password recovery and profile edits.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("email is already registered")]
    DuplicateEmail,

    #[error("username is already taken")]
    DuplicateUsername,

    #[error("no user with that email")]
    UnknownEmail,

    #[error("user not found")]
    NotFound,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(DbError),
}

impl From<DbError> for AccountError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::DuplicateEmail => Self::DuplicateEmail,
            DbError::DuplicateUsername => Self::DuplicateUsername,
            DbError::NotFound(_) => Self::NotFound,
            other => Self::Store(other),
        }
    }
}
