use crate::database::models::PostRecord;
use crate::database::repositories::PostScope;

/// `visitorId` value sent by clients that are not signed in.
pub const ANONYMOUS_VISITOR_ID: i64 = 0;

/// Who is looking at a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    Member(i64),
}

impl Viewer {
    pub fn from_visitor_id(visitor_id: i64) -> Self {
        if visitor_id == ANONYMOUS_VISITOR_ID {
            Viewer::Anonymous
        } else {
            Viewer::Member(visitor_id)
        }
    }

    /// Predicate pushed down into post queries for this viewer.
    pub fn scope(&self) -> PostScope {
        match self {
            Viewer::Anonymous => PostScope::PublicOnly,
            Viewer::Member(_) => PostScope::All,
        }
    }
}

/// Drops posts the viewer may not see.
///
/// Only the anonymous branch restricts anything. A member viewer is not
/// checked against the post's author or the follow graph, so any non-zero
/// visitor id sees private posts.
pub fn filter(posts: Vec<PostRecord>, viewer: Viewer) -> Vec<PostRecord> {
    match viewer {
        Viewer::Anonymous => {
            let before = posts.len();
            let visible: Vec<PostRecord> = posts.into_iter().filter(|p| !p.privacy).collect();
            if visible.len() != before {
                tracing::debug!(hidden = before - visible.len(), "filtered private posts");
            }
            visible
        }
        Viewer::Member(_) => posts,
    }
}
