use std::sync::Arc;
use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use axum_extra::headers::{Authorization, authorization::Bearer};
use axum_extra::typed_header::{TypedHeader, TypedHeaderRejection};
use tracing::info;

use clubhouse_auth::{
    AuthenticationService, AuthorizationPolicy, NewAccount, PasswordHasher, SessionManager,
};
use clubhouse_db::{ContentRepository, Database};
use clubhouse_types::api::{LoginRequest, LoginResponse, RecoverRequest, RegisterRequest, RegisterResponse};

use crate::error::ApiError;
use crate::run_blocking;
use crate::validate::Checks;

pub type AppState = Arc<AppStateInner>;

/// Runtime knobs for the services behind the API.
#[derive(Debug, Clone)]
pub struct Settings {
    pub session_ttl: Duration,
    pub member_code: String,
    pub admin_code: String,
    pub default_avatar: String,
}

pub struct AppStateInner {
    pub auth: AuthenticationService,
    pub sessions: SessionManager,
    pub policy: AuthorizationPolicy,
    pub content: ContentRepository,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, hasher: PasswordHasher, settings: Settings) -> Self {
        Self {
            auth: AuthenticationService::new(db.clone(), hasher, settings.default_avatar),
            sessions: SessionManager::new(db.clone(), settings.session_ttl),
            policy: AuthorizationPolicy::new(db.clone(), settings.member_code, settings.admin_code),
            content: ContentRepository::new(db),
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let first_name = req.first_name.trim().to_string();
    let last_name = req.last_name.trim().to_string();
    let email = req.email.trim().to_string();
    let username = req.username.trim().to_string();

    Checks::new()
        .person_name("First name", &first_name)
        .person_name("Last name", &last_name)
        .email(&email)
        .username(&username)
        .password(&req.password)
        .confirmation(&req.password, &req.confirm_password)
        .finish()?;

    let user_id = run_blocking(move || {
        Ok(state.auth.register(&NewAccount {
            first_name: &first_name,
            last_name: &last_name,
            email: &email,
            username: &username,
            password: &req.password,
        })?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();

    let (principal, token) = run_blocking(move || {
        let principal = state.auth.authenticate(&username, &req.password)?;
        let token = state.sessions.create(&principal);
        Ok((principal, token))
    })
    .await?;

    info!("User {} logged in", principal.username);

    Ok(Json(LoginResponse {
        user_id: principal.id,
        username: principal.username,
        token,
    }))
}

pub async fn recover(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RecoverRequest>, ApiError>,
) -> Result<StatusCode, ApiError> {
    let email = req.email.trim().to_string();

    Checks::new()
        .email(&email)
        .password(&req.password)
        .confirmation(&req.password, &req.confirm_password)
        .finish()?;

    run_blocking(move || Ok(state.auth.recover_password(&email, &req.password)?)).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Always succeeds; a missing, malformed or unknown token is already
/// logged out.
pub async fn logout(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
) -> StatusCode {
    if let Ok(TypedHeader(Authorization(bearer))) = bearer {
        state.sessions.destroy(bearer.token());
    }
    StatusCode::NO_CONTENT
}
