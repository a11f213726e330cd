use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error, warn};

use clubhouse_auth::{AccountError, AuthError, PolicyError, SessionError};
use clubhouse_db::DbError;
use clubhouse_types::api::ErrorResponse;

/// Everything a handler can fail with, already classified for the client.
/// Store failures are logged where they are converted and leave only a
/// generic message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Please fix the highlighted fields.")]
    Validation(Vec<String>),

    /// Unknown user and wrong password look the same from outside.
    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("Please log in.")]
    Unauthenticated,

    #[error("You can only change your own posts.")]
    Forbidden,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("Not the secret :(")]
    NotRecognized,

    #[error("Something went wrong. Please try again.")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotRecognized => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.to_string();
        let details = match self {
            Self::Validation(details) => details,
            _ => Vec::new(),
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

/// A body that doesn't parse into the expected request is a field problem
/// like any other.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected request body: {}", rejection.body_text());
        Self::Validation(vec![rejection.body_text()])
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        debug!("Rejected path: {}", rejection.body_text());
        Self::Validation(vec![rejection.body_text()])
    }
}

const DUPLICATE_EMAIL: &str = "This email is already registered and linked to a user in the system. \
                               Please sign up with another email or log in to your account if it belongs to you.";
const DUPLICATE_USERNAME: &str = "This username is already taken.";

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound("post") => Self::NotFound("Post not found."),
            DbError::NotFound(_) => Self::NotFound("Not found."),
            DbError::DuplicateEmail => Self::Conflict(DUPLICATE_EMAIL),
            DbError::DuplicateUsername => Self::Conflict(DUPLICATE_USERNAME),
            other => {
                error!("Store error: {}", other);
                Self::Internal
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::UnknownUser | AuthError::BadPassword => {
                warn!("Login rejected: {}", e);
                Self::InvalidCredentials
            }
            AuthError::Store(e) => e.into(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::ExpiredOrUnknown => Self::Unauthenticated,
            SessionError::Store(e) => e.into(),
        }
    }
}

impl From<PolicyError> for ApiError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::NotRecognized => Self::NotRecognized,
            PolicyError::Store(e) => e.into(),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::DuplicateEmail => Self::Conflict(DUPLICATE_EMAIL),
            AccountError::DuplicateUsername => Self::Conflict(DUPLICATE_USERNAME),
            AccountError::UnknownEmail => {
                Self::NotFound("This email is not linked to a user in the system.")
            }
            AccountError::NotFound => Self::NotFound("Not found."),
            AccountError::Hash(e) => {
                error!("Password hashing failed: {}", e);
                Self::Internal
            }
            AccountError::Store(e) => e.into(),
        }
    }
}
