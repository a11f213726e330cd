use axum::{Extension, Json, extract::State, http::StatusCode};
use axum_extra::extract::WithRejection;
use tracing::info;

use clubhouse_auth::ProfileChanges;
use clubhouse_types::api::{MembershipRequest, MembershipResponse, UpdateProfileRequest};
use clubhouse_types::models::Principal;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentSession;
use crate::run_blocking;
use crate::validate::Checks;

pub async fn me(Extension(session): Extension<CurrentSession>) -> Json<Principal> {
    Json(session.principal)
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateProfileRequest>, ApiError>,
) -> Result<StatusCode, ApiError> {
    let first_name = req.first_name.trim().to_string();
    let last_name = req.last_name.trim().to_string();
    let email = req.email.trim().to_string();
    let username = req.username.trim().to_string();
    let password = req.password.filter(|p| !p.is_empty());

    let mut checks = Checks::new();
    checks
        .person_name("First name", &first_name)
        .person_name("Last name", &last_name)
        .email(&email)
        .username(&username);
    if let Some(password) = &password {
        checks.password(password);
    }
    checks.finish()?;

    let user_id = session.principal.id;
    run_blocking(move || {
        Ok(state.auth.update_profile(
            user_id,
            &ProfileChanges {
                first_name: &first_name,
                last_name: &last_name,
                email: &email,
                username: &username,
                password: password.as_deref(),
                avatar_ref: req.avatar_ref.as_deref(),
            },
        )?)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /me/membership: trade a secret code for a higher tier.
pub async fn upgrade_membership(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    WithRejection(Json(req), _): WithRejection<Json<MembershipRequest>, ApiError>,
) -> Result<Json<MembershipResponse>, ApiError> {
    let secret = req.secret.trim().to_string();
    Checks::new().secret(&secret).finish()?;

    let user_id = session.principal.id;
    let tier = run_blocking(move || Ok(state.policy.upgrade(&secret, user_id)?)).await?;

    Ok(Json(MembershipResponse { tier }))
}

/// DELETE /me: remove the account and everything it owns, then end
/// every session it had.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<StatusCode, ApiError> {
    let user_id = session.principal.id;

    let posts_removed = run_blocking(move || {
        let removed = state.content.delete_user(user_id)?;
        state.sessions.revoke_user(user_id);
        state.sessions.destroy(&session.token);
        Ok(removed)
    })
    .await?;

    info!("Account {} deleted ({} posts)", user_id, posts_removed);
    Ok(StatusCode::NO_CONTENT)
}
