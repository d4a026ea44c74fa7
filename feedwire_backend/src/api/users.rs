use super::{ApiError, ApiResult, AppState, ToggleResponse};
use crate::database::models::{NewUser, UserRecord};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateUserRequest {
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FollowRequest {
    follower_id: i64,
}

pub(crate) async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserRecord>), ApiError> {
    let user = state.feed.create_user(NewUser {
        username: payload.username,
        first_name: payload.first_name,
        last_name: payload.last_name,
    })?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(crate) async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<UserRecord> {
    Ok(Json(state.feed.user(user_id)?))
}

pub(crate) async fn get_user_by_name(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<UserRecord> {
    Ok(Json(state.feed.user_by_username(&username)?))
}

/// `id` is the account being followed.
pub(crate) async fn follow_user(
    State(state): State<AppState>,
    Path(followee_id): Path<i64>,
    Json(payload): Json<FollowRequest>,
) -> ApiResult<ToggleResponse> {
    let changed = state.feed.follow(payload.follower_id, followee_id)?;
    Ok(Json(ToggleResponse { changed }))
}

pub(crate) async fn unfollow_user(
    State(state): State<AppState>,
    Path(followee_id): Path<i64>,
    Json(payload): Json<FollowRequest>,
) -> ApiResult<ToggleResponse> {
    let changed = state.feed.unfollow(payload.follower_id, followee_id)?;
    Ok(Json(ToggleResponse { changed }))
}
