use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use uuid::Uuid;

use clubhouse_types::api::{CreatePostResponse, PostRequest};
use clubhouse_types::models::PostView;

use crate::auth::{AppState, AppStateInner};
use crate::error::ApiError;
use crate::middleware::CurrentSession;
use crate::run_blocking;
use crate::validate::Checks;

/// GET /posts: every post, annotated for the caller.
pub async fn list_posts(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<Vec<PostView>>, ApiError> {
    let viewer = session.principal.id;
    let posts = run_blocking(move || Ok(state.content.list_all_posts(viewer)?)).await?;
    Ok(Json(posts))
}

/// GET /me/posts: only the caller's posts.
pub async fn my_posts(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<Vec<PostView>>, ApiError> {
    let owner = session.principal.id;
    let posts = run_blocking(move || Ok(state.content.list_posts_for_owner(owner)?)).await?;
    Ok(Json(posts))
}

pub async fn get_post(
    State(state): State<AppState>,
    WithRejection(Path(post_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<PostView>, ApiError> {
    let viewer = session.principal.id;
    let post = run_blocking(move || Ok(state.content.get_post(post_id, viewer)?)).await?;
    Ok(Json(post))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    WithRejection(Json(req), _): WithRejection<Json<PostRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    let content = req.content.trim().to_string();
    Checks::new().post(&title, &content).finish()?;

    let author = session.principal.id;
    let id = run_blocking(move || {
        Ok(state.content.create_post(author, &title, &content, Utc::now())?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(CreatePostResponse { id })))
}

pub async fn edit_post(
    State(state): State<AppState>,
    WithRejection(Path(post_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(session): Extension<CurrentSession>,
    WithRejection(Json(req), _): WithRejection<Json<PostRequest>, ApiError>,
) -> Result<StatusCode, ApiError> {
    let title = req.title.trim().to_string();
    let content = req.content.trim().to_string();
    Checks::new().post(&title, &content).finish()?;

    let caller = session.principal.id;
    run_blocking(move || {
        match owner_check(&state, caller, post_id)? {
            Ownership::Owner => Ok(state.content.edit_post(post_id, &title, &content)?),
            Ownership::Missing => Err(ApiError::NotFound("Post not found.")),
            Ownership::Other => Err(ApiError::Forbidden),
        }
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /posts/{id}. A post that is already gone counts as deleted.
pub async fn delete_post(
    State(state): State<AppState>,
    WithRejection(Path(post_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(session): Extension<CurrentSession>,
) -> Result<StatusCode, ApiError> {
    let caller = session.principal.id;
    run_blocking(move || {
        match owner_check(&state, caller, post_id)? {
            Ownership::Owner => Ok(state.content.delete_post(post_id)?),
            Ownership::Missing => Ok(()),
            Ownership::Other => Err(ApiError::Forbidden),
        }
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

enum Ownership {
    Owner,
    Other,
    Missing,
}

fn owner_check(state: &AppStateInner, caller: Uuid, post_id: Uuid) -> Result<Ownership, ApiError> {
    Ok(match state.content.post_owner(post_id)? {
        Some(owner) if owner == caller => Ownership::Owner,
        Some(_) => Ownership::Other,
        None => Ownership::Missing,
    })
}
