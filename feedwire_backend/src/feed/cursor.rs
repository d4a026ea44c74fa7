//! Offset-id cursors and the bounded page fetches built on them.

use crate::database::models::{CommentRecord, PostRecord};
use crate::database::repositories::{CommentRepository, IdBound, PostRepository, PostScope};
use crate::error::{FeedError, FeedResult};
use serde::Serialize;

/// `offset_id` value meaning "no position yet".
pub const START_OF_STREAM: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Newer than the offset, oldest first.
    Forward,
    /// Older than the offset, newest first.
    Backward,
}

/// Position in an id-ordered stream. Construct with [`Cursor::new`], which
/// rejects bad input before any storage access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    offset_id: i64,
    limit: u32,
    direction: Direction,
}

impl Cursor {
    pub fn new(offset_id: i64, limit: i64, direction: Direction) -> FeedResult<Self> {
        if limit <= 0 {
            return Err(FeedError::invalid(format!("limit must be positive, got {limit}")));
        }
        if offset_id < 0 {
            return Err(FeedError::invalid(format!(
                "offsetId must not be negative, got {offset_id}"
            )));
        }
        let limit = u32::try_from(limit).unwrap_or(u32::MAX);
        Ok(Self {
            offset_id,
            limit,
            direction,
        })
    }

    pub fn forward(offset_id: i64, limit: i64) -> FeedResult<Self> {
        Self::new(offset_id, limit, Direction::Forward)
    }

    pub fn backward(offset_id: i64, limit: i64) -> FeedResult<Self> {
        Self::new(offset_id, limit, Direction::Backward)
    }

    /// Caps the page size; validation has already happened.
    pub fn clamped(mut self, max_limit: u32) -> Self {
        self.limit = self.limit.min(max_limit.max(1));
        self
    }

    pub fn offset_id(&self) -> i64 {
        self.offset_id
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_start(&self) -> bool {
        self.offset_id == START_OF_STREAM
    }

    /// Storage bound for this cursor. From the start of a stream both
    /// directions begin at the most recent items.
    pub(crate) fn bound(&self) -> IdBound {
        match (self.direction, self.is_start()) {
            (_, true) => IdBound::Latest,
            (Direction::Forward, false) => IdBound::After(self.offset_id),
            (Direction::Backward, false) => IdBound::Before(self.offset_id),
        }
    }

    /// Order in which items of a page are returned: ascending for forward
    /// pages, descending for backward ones.
    pub(crate) fn ascending(&self) -> bool {
        self.direction == Direction::Forward
    }
}

/// Which id-ordered stream a cursor walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKey {
    UserPosts { author_id: i64 },
    Timeline { user_id: i64 },
    PostComments { post_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
        }
    }

    /// Builds a page from up to `limit + 1` rows already in page order.
    pub(crate) fn from_overfetch(mut rows: Vec<T>, limit: u32) -> Self {
        let has_more = rows.len() > limit as usize;
        rows.truncate(limit as usize);
        Self {
            items: rows,
            has_more,
        }
    }
}

/// One author's posts within the cursor bound.
///
/// The storage query always returns the newest rows first for the start
/// sentinel, so a forward page from the start is re-ordered ascending here.
pub fn fetch_author_posts<P: PostRepository + ?Sized>(
    posts: &P,
    author_id: i64,
    cursor: &Cursor,
    scope: PostScope,
) -> FeedResult<Page<PostRecord>> {
    let rows = posts.page_by_author(
        author_id,
        cursor.bound(),
        scope,
        cursor.limit().saturating_add(1),
    )?;
    let mut page = Page::from_overfetch(rows, cursor.limit());
    sort_by_id(&mut page.items, |post| post.id, cursor.ascending());
    Ok(page)
}

pub fn fetch_post_comments<C: CommentRepository + ?Sized>(
    comments: &C,
    post_id: i64,
    cursor: &Cursor,
) -> FeedResult<Page<CommentRecord>> {
    let rows =
        comments.page_for_post(post_id, cursor.bound(), cursor.limit().saturating_add(1))?;
    let mut page = Page::from_overfetch(rows, cursor.limit());
    sort_by_id(&mut page.items, |comment| comment.id, cursor.ascending());
    Ok(page)
}

pub(crate) fn sort_by_id<T>(items: &mut [T], id: impl Fn(&T) -> i64, ascending: bool) {
    if ascending {
        items.sort_by_key(|item| id(item));
    } else {
        items.sort_by_key(|item| std::cmp::Reverse(id(item)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::tests::{new_post, new_user, setup_conn};
    use crate::database::repositories::SqliteRepositories;

    fn ids(page: &Page<PostRecord>) -> Vec<i64> {
        page.items.iter().map(|p| p.id).collect()
    }

    #[test]
    fn non_positive_limits_are_rejected() {
        assert!(matches!(
            Cursor::forward(0, 0),
            Err(FeedError::InvalidArgument(_))
        ));
        assert!(matches!(
            Cursor::backward(10, -3),
            Err(FeedError::InvalidArgument(_))
        ));
        assert!(matches!(
            Cursor::forward(-1, 5),
            Err(FeedError::InvalidArgument(_))
        ));
    }

    #[test]
    fn clamping_caps_the_limit() {
        let cursor = Cursor::forward(0, 10_000).unwrap().clamped(200);
        assert_eq!(cursor.limit(), 200);
        let cursor = Cursor::forward(0, 5).unwrap().clamped(200);
        assert_eq!(cursor.limit(), 5);
    }

    #[test]
    fn forward_pages_are_bounded_and_ascending() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let alice = new_user(&repos, "alice");
        let created: Vec<i64> = (0..7).map(|_| new_post(&repos, alice, false)).collect();
        let posts = repos.posts();

        let cursor = Cursor::forward(created[2], 3).unwrap();
        let page = fetch_author_posts(&posts, alice, &cursor, PostScope::All).unwrap();
        assert_eq!(ids(&page), vec![created[3], created[4], created[5]]);
        assert!(page.has_more);
        assert!(page.items.iter().all(|p| p.id > created[2]));

        let cursor = Cursor::forward(created[5], 3).unwrap();
        let page = fetch_author_posts(&posts, alice, &cursor, PostScope::All).unwrap();
        assert_eq!(ids(&page), vec![created[6]]);
        assert!(!page.has_more);
    }

    #[test]
    fn forward_from_start_returns_most_recent_ascending() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let alice = new_user(&repos, "alice");
        let created: Vec<i64> = (0..5).map(|_| new_post(&repos, alice, false)).collect();
        let posts = repos.posts();

        let cursor = Cursor::forward(START_OF_STREAM, 3).unwrap();
        let page = fetch_author_posts(&posts, alice, &cursor, PostScope::All).unwrap();
        assert_eq!(ids(&page), vec![created[2], created[3], created[4]]);
        assert!(page.has_more);
    }

    #[test]
    fn backward_pages_are_descending_below_the_offset() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let alice = new_user(&repos, "alice");
        let created: Vec<i64> = (0..6).map(|_| new_post(&repos, alice, false)).collect();
        let posts = repos.posts();

        let cursor = Cursor::backward(created[4], 3).unwrap();
        let page = fetch_author_posts(&posts, alice, &cursor, PostScope::All).unwrap();
        assert_eq!(ids(&page), vec![created[3], created[2], created[1]]);
        assert!(page.has_more);

        let cursor = Cursor::backward(START_OF_STREAM, 2).unwrap();
        let page = fetch_author_posts(&posts, alice, &cursor, PostScope::All).unwrap();
        assert_eq!(ids(&page), vec![created[5], created[4]]);
    }
}
