use super::{
    default_limit, wait_response, ApiError, AppState, CreatedResponse, PageResponse, PageResult,
};
use crate::database::models::CommentRecord;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommentPageParams {
    #[serde(default)]
    offset_id: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommentUpdatesParams {
    #[serde(default)]
    offset_id: i64,
    #[serde(default = "default_limit")]
    limit: i64,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddCommentRequest {
    user_id: i64,
    text: String,
}

pub(crate) async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Query(params): Query<CommentPageParams>,
) -> PageResult<CommentRecord> {
    let page = state
        .feed
        .comments(post_id, params.offset_id, params.limit)?;
    Ok(PageResponse(page))
}

pub(crate) async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(payload): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let id = state
        .feed
        .add_comment(post_id, payload.user_id, payload.text)?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub(crate) async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.feed.delete_comment(comment_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn wait_for_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Query(params): Query<CommentUpdatesParams>,
) -> PageResult<CommentRecord> {
    let cancel = state.shutdown.child_token();
    let outcome = state
        .feed
        .wait_for_comments(
            post_id,
            params.offset_id,
            params.limit,
            params.timeout_secs.map(Duration::from_secs),
            &cancel,
        )
        .await?;
    wait_response(outcome)
}
