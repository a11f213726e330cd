use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, authorization::Bearer};
use axum_extra::typed_header::{TypedHeader, TypedHeaderRejection};
use tracing::debug;

use clubhouse_types::models::Principal;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;

/// The resolved caller, inserted into request extensions by
/// [`require_session`].
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub token: String,
    pub principal: Principal,
}

/// Resolve the Bearer session token against the current user row. A
/// missing header and one with another scheme are both unauthenticated.
pub async fn require_session(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|rejection| {
        debug!("No usable session header: {}", rejection);
        ApiError::Unauthenticated
    })?;
    let token = bearer.token().to_string();

    let lookup = token.clone();
    let principal = run_blocking(move || Ok(state.sessions.resolve(&lookup)?)).await?;

    debug!("Session resolved for user {}", principal.id);
    req.extensions_mut().insert(CurrentSession { token, principal });
    Ok(next.run(req).await)
}
