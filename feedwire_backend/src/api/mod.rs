mod comments;
mod posts;
mod users;

use crate::config::FeedwireConfig;
use crate::error::FeedError;
use crate::feed::{FeedService, Page, WaitOutcome};
use anyhow::Result;
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Page size used when a request leaves `limit` out.
pub(crate) const DEFAULT_PAGE_SIZE: i64 = 20;

/// Set on every list response; `true` when the store holds more items past
/// the page in the direction it was read.
pub const HAS_MORE_HEADER: &str = "x-has-more";

pub(crate) fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

#[derive(Clone)]
pub struct AppState {
    pub config: FeedwireConfig,
    pub feed: FeedService,
    /// Cancelled on shutdown; long-poll handlers wait on child tokens.
    pub shutdown: CancellationToken,
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

/// A page rendered as a bare JSON array plus the [`HAS_MORE_HEADER`].
#[derive(Debug)]
pub(crate) struct PageResponse<T>(pub Page<T>);

impl<T: Serialize> IntoResponse for PageResponse<T> {
    fn into_response(self) -> Response {
        let has_more = if self.0.has_more { "true" } else { "false" };
        ([(HAS_MORE_HEADER, has_more)], Json(self.0.items)).into_response()
    }
}

pub(crate) type PageResult<T> = Result<PageResponse<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse { message: msg }),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse { message: msg }),
            ApiError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse { message: msg },
            ),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: "internal server error".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            FeedError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            FeedError::DataIntegrity(msg) => ApiError::Internal(anyhow::anyhow!(msg)),
            FeedError::Unavailable(err) => {
                tracing::warn!(error = ?err, "request failed, service unavailable");
                ApiError::Unavailable("service temporarily unavailable".into())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatedResponse {
    pub id: i64,
}

/// Result of an idempotent toggle such as like or follow.
#[derive(Debug, Serialize)]
pub(crate) struct ToggleResponse {
    pub changed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    api_port: u16,
}

pub(crate) async fn health_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        api_port: state.config.api_port,
    })
}

/// A timed-out wait answers with an empty list; a cancelled one means the
/// server is going away.
pub(crate) fn wait_response<T>(outcome: WaitOutcome<Page<T>>) -> PageResult<T> {
    match outcome {
        WaitOutcome::Ready(page) => Ok(PageResponse(page)),
        WaitOutcome::TimedOut => Ok(PageResponse(Page::empty())),
        WaitOutcome::Cancelled => Err(ApiError::Unavailable("server is shutting down".into())),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/posts", get(posts::user_posts).post(posts::add_post))
        .route("/posts/updates", get(posts::wait_for_posts))
        .route("/posts/previous", get(posts::previous_posts))
        .route("/posts/timeline", get(posts::timeline))
        .route("/posts/timeline/updates", get(posts::wait_for_timeline))
        .route("/posts/timeline/previous", get(posts::previous_timeline))
        .route("/posts/timeline/count/:user_id", get(posts::timeline_count))
        .route("/posts/:id", get(posts::post_by_id))
        .route("/posts/:id/delete", post(posts::delete_post))
        .route("/posts/:id/like", post(posts::like_post))
        .route("/posts/:id/unlike", post(posts::unlike_post))
        .route(
            "/posts/:id/comments",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route("/posts/:id/comments/updates", get(comments::wait_for_comments))
        .route("/comments/:id/delete", post(comments::delete_comment))
        .route("/users", post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .route("/users/by-name/:username", get(users::get_user_by_name))
        .route("/users/:id/follow", post(users::follow_user))
        .route("/users/:id/unfollow", post(users::unfollow_user))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers([HeaderName::from_static(HAS_MORE_HEADER)]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let Some(port) = start_port.checked_add(offset) else {
            break;
        };
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "Port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "Could not find available port in range {}-{}",
        start_port,
        start_port.saturating_add(MAX_PORT_ATTEMPTS - 1)
    )
}

pub async fn serve_http(
    config: FeedwireConfig,
    feed: FeedService,
    shutdown: CancellationToken,
) -> Result<()> {
    let (listener, actual_port) = find_available_port(config.api_port).await?;
    if actual_port != config.api_port {
        tracing::warn!(
            requested_port = config.api_port,
            actual_port = actual_port,
            "Configured port was in use, bound to next available port"
        );
    }

    let state = AppState {
        config,
        feed,
        shutdown,
    };
    serve(listener, state).await
}

/// Serves on an already bound listener until the shutdown token fires.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr()?;
    let shutdown = state.shutdown.clone();
    let router = router(state);

    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    tracing::info!(?addr, "HTTP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_errors_map_to_status_codes() {
        let cases = [
            (FeedError::invalid("limit"), StatusCode::BAD_REQUEST),
            (FeedError::not_found("post 3"), StatusCode::NOT_FOUND),
            (
                FeedError::DataIntegrity("orphan".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                FeedError::Unavailable(anyhow::anyhow!("locked")),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            let (actual, _) = ApiError::from(err).into_response_parts();
            assert_eq!(actual, status);
        }
    }

    #[test]
    fn timed_out_waits_return_an_empty_list() {
        let PageResponse(page) = wait_response::<i64>(WaitOutcome::TimedOut).unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
        assert!(matches!(
            wait_response::<i64>(WaitOutcome::Cancelled),
            Err(ApiError::Unavailable(_))
        ));
    }

    #[test]
    fn list_responses_carry_the_has_more_header() {
        let page = Page {
            items: vec![1, 2],
            has_more: true,
        };
        let response = PageResponse(page).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[HAS_MORE_HEADER], "true");

        let response = PageResponse(Page::<i64>::empty()).into_response();
        assert_eq!(response.headers()[HAS_MORE_HEADER], "false");
    }
}
