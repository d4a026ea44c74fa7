use super::{
    default_limit, wait_response, ApiError, ApiResult, AppState, CreatedResponse, PageResponse,
    PageResult, ToggleResponse,
};
use crate::feed::{AggregateView, PostDraft};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserPostsParams {
    user_id: i64,
    #[serde(default)]
    visitor_id: i64,
    #[serde(default)]
    offset_id: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserPostUpdatesParams {
    user_id: i64,
    #[serde(default)]
    visitor_id: i64,
    #[serde(default)]
    offset_id: i64,
    #[serde(default = "default_limit")]
    limit: i64,
    timeout_secs: Option<u64>,
}

/// Timeline queries; a missing `visitorId` means the owner is looking.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TimelineParams {
    user_id: i64,
    visitor_id: Option<i64>,
    #[serde(default)]
    offset_id: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TimelineUpdatesParams {
    user_id: i64,
    visitor_id: Option<i64>,
    #[serde(default)]
    offset_id: i64,
    #[serde(default = "default_limit")]
    limit: i64,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddPostRequest {
    author_id: i64,
    text: String,
    #[serde(default)]
    privacy: bool,
    #[serde(default)]
    expandable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LikeRequest {
    user_id: i64,
}

pub(crate) async fn user_posts(
    State(state): State<AppState>,
    Query(params): Query<UserPostsParams>,
) -> PageResult<AggregateView> {
    let page = state
        .feed
        .user_posts(params.user_id, params.visitor_id, params.offset_id, params.limit)?;
    Ok(PageResponse(page))
}

pub(crate) async fn previous_posts(
    State(state): State<AppState>,
    Query(params): Query<UserPostsParams>,
) -> PageResult<AggregateView> {
    let page = state.feed.previous_posts(
        params.user_id,
        params.visitor_id,
        params.offset_id,
        params.limit,
    )?;
    Ok(PageResponse(page))
}

pub(crate) async fn wait_for_posts(
    State(state): State<AppState>,
    Query(params): Query<UserPostUpdatesParams>,
) -> PageResult<AggregateView> {
    let cancel = state.shutdown.child_token();
    let outcome = state
        .feed
        .wait_for_posts(
            params.user_id,
            params.visitor_id,
            params.offset_id,
            params.limit,
            params.timeout_secs.map(Duration::from_secs),
            &cancel,
        )
        .await?;
    wait_response(outcome)
}

pub(crate) async fn timeline(
    State(state): State<AppState>,
    Query(params): Query<TimelineParams>,
) -> PageResult<AggregateView> {
    let page = state
        .feed
        .timeline(params.user_id, params.visitor_id, params.offset_id, params.limit)?;
    Ok(PageResponse(page))
}

pub(crate) async fn previous_timeline(
    State(state): State<AppState>,
    Query(params): Query<TimelineParams>,
) -> PageResult<AggregateView> {
    let page = state.feed.previous_timeline(
        params.user_id,
        params.visitor_id,
        params.offset_id,
        params.limit,
    )?;
    Ok(PageResponse(page))
}

pub(crate) async fn wait_for_timeline(
    State(state): State<AppState>,
    Query(params): Query<TimelineUpdatesParams>,
) -> PageResult<AggregateView> {
    let cancel = state.shutdown.child_token();
    let outcome = state
        .feed
        .wait_for_timeline(
            params.user_id,
            params.visitor_id,
            params.offset_id,
            params.limit,
            params.timeout_secs.map(Duration::from_secs),
            &cancel,
        )
        .await?;
    wait_response(outcome)
}

pub(crate) async fn timeline_count(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<i64> {
    Ok(Json(state.feed.timeline_count(user_id)?))
}

pub(crate) async fn post_by_id(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> ApiResult<AggregateView> {
    Ok(Json(state.feed.post_by_id(post_id)?))
}

pub(crate) async fn add_post(
    State(state): State<AppState>,
    Json(payload): Json<AddPostRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let id = state.feed.add_post(PostDraft {
        author_id: payload.author_id,
        text: payload.text,
        privacy: payload.privacy,
        expandable: payload.expandable,
    })?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub(crate) async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.feed.delete_post(post_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn like_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(payload): Json<LikeRequest>,
) -> ApiResult<ToggleResponse> {
    let changed = state.feed.like(post_id, payload.user_id)?;
    Ok(Json(ToggleResponse { changed }))
}

pub(crate) async fn unlike_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(payload): Json<LikeRequest>,
) -> ApiResult<ToggleResponse> {
    let changed = state.feed.unlike(post_id, payload.user_id)?;
    Ok(Json(ToggleResponse { changed }))
}
