use super::assembler::{assemble, AggregateView};
use super::cursor::{
    fetch_author_posts, fetch_post_comments, sort_by_id, Cursor, Direction, Page, StreamKey,
};
use super::privacy::{self, Viewer};
use super::timeline::{count_posts_in_timeline, resolve_timeline};
use super::waiter::{UpdateNotifier, UpdateWaiter, WaitOutcome, WaitState};
use crate::config::FeedConfig;
use crate::database::models::{
    CommentRecord, FollowEdge, NewComment, NewPost, NewUser, PostRecord, UserRecord,
};
use crate::database::repositories::{
    CommentRepository, FollowingRepository, LikeRepository, PostRepository, PostScope,
    SqliteRepositories, UserRepository,
};
use crate::database::Database;
use crate::error::{FeedError, FeedResult};
use crate::utils::{now_time_iso, today_iso};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Input for [`FeedService::add_post`].
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub author_id: i64,
    pub text: String,
    pub privacy: bool,
    pub expandable: bool,
}

/// Entry point for every feed operation the API exposes.
///
/// Reads run inside a single storage access so a page and its counts agree.
/// Writes fire the [`UpdateNotifier`] once they have committed.
#[derive(Clone)]
pub struct FeedService {
    database: Database,
    notifier: UpdateNotifier,
    waiter: UpdateWaiter,
    max_page_size: u32,
}

impl FeedService {
    pub fn new(database: Database, config: &FeedConfig) -> Self {
        let notifier = UpdateNotifier::new();
        let waiter = UpdateWaiter::new(notifier.clone(), config);
        Self {
            database,
            notifier,
            waiter,
            max_page_size: config.max_page_size,
        }
    }

    /// Long-poll waits that could still park right now.
    pub fn available_wait_slots(&self) -> usize {
        self.waiter.available_slots()
    }

    /// Validates raw paging input and caps the page size.
    pub fn cursor(&self, offset_id: i64, limit: i64, direction: Direction) -> FeedResult<Cursor> {
        Ok(Cursor::new(offset_id, limit, direction)?.clamped(self.max_page_size))
    }

    /// Posts by `author_id` newer than the offset, ascending.
    pub fn user_posts(
        &self,
        author_id: i64,
        visitor_id: i64,
        offset_id: i64,
        limit: i64,
    ) -> FeedResult<Page<AggregateView>> {
        let cursor = self.cursor(offset_id, limit, Direction::Forward)?;
        let viewer = Viewer::from_visitor_id(visitor_id);
        tracing::debug!(author_id, visitor_id, offset_id, limit, "loading user posts");
        self.load_author_page(author_id, viewer, &cursor)
    }

    /// Posts by `author_id` older than the offset, newest first.
    pub fn previous_posts(
        &self,
        author_id: i64,
        visitor_id: i64,
        offset_id: i64,
        limit: i64,
    ) -> FeedResult<Page<AggregateView>> {
        let cursor = self.cursor(offset_id, limit, Direction::Backward)?;
        let viewer = Viewer::from_visitor_id(visitor_id);
        let mut page = self.load_author_page(author_id, viewer, &cursor)?;
        sort_by_id(&mut page.items, |view| view.post.id, false);
        Ok(page)
    }

    pub fn post_by_id(&self, post_id: i64) -> FeedResult<AggregateView> {
        self.with_store(|repos| {
            let post = require_post(repos, post_id)?;
            let mut views =
                assemble(&repos.users(), &repos.likes(), &repos.comments(), vec![post])?;
            views
                .pop()
                .ok_or_else(|| FeedError::not_found(format!("post {post_id}")))
        })
    }

    pub fn add_post(&self, draft: PostDraft) -> FeedResult<i64> {
        if draft.text.trim().is_empty() {
            return Err(FeedError::invalid("post text must not be empty"));
        }
        let author_id = draft.author_id;
        let post_id = self.with_store(|repos| {
            require_user(repos, author_id)?;
            Ok(repos.posts().create(&NewPost {
                author_id,
                text: draft.text,
                created_date: today_iso(),
                created_time: now_time_iso(),
                privacy: draft.privacy,
                expandable: draft.expandable,
            })?)
        })?;
        tracing::info!(post_id, author_id, privacy = draft.privacy, "post added");
        self.notifier.notify();
        Ok(post_id)
    }

    pub fn delete_post(&self, post_id: i64) -> FeedResult<()> {
        let deleted = self.with_store(|repos| Ok(repos.posts().delete(post_id)?))?;
        if !deleted {
            return Err(FeedError::not_found(format!("post {post_id}")));
        }
        tracing::info!(post_id, "post deleted");
        self.notifier.notify();
        Ok(())
    }

    /// Followees' posts newer than the offset, ascending. Without a
    /// `visitor_id` the owner is the viewer.
    pub fn timeline(
        &self,
        user_id: i64,
        visitor_id: Option<i64>,
        offset_id: i64,
        limit: i64,
    ) -> FeedResult<Page<AggregateView>> {
        let cursor = self.cursor(offset_id, limit, Direction::Forward)?;
        let viewer = timeline_viewer(user_id, visitor_id);
        tracing::debug!(user_id, ?viewer, offset_id, limit, "loading timeline");
        self.load_timeline_page(user_id, viewer, &cursor)
    }

    pub fn previous_timeline(
        &self,
        user_id: i64,
        visitor_id: Option<i64>,
        offset_id: i64,
        limit: i64,
    ) -> FeedResult<Page<AggregateView>> {
        let cursor = self.cursor(offset_id, limit, Direction::Backward)?;
        let viewer = timeline_viewer(user_id, visitor_id);
        let mut page = self.load_timeline_page(user_id, viewer, &cursor)?;
        sort_by_id(&mut page.items, |view| view.post.id, false);
        Ok(page)
    }

    pub fn timeline_count(&self, user_id: i64) -> FeedResult<i64> {
        self.with_store(|repos| count_posts_in_timeline(&repos.posts(), user_id))
    }

    pub async fn wait_for_posts(
        &self,
        author_id: i64,
        visitor_id: i64,
        offset_id: i64,
        limit: i64,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> FeedResult<WaitOutcome<Page<AggregateView>>> {
        let cursor = self.cursor(offset_id, limit, Direction::Forward)?;
        let viewer = Viewer::from_visitor_id(visitor_id);
        let key = StreamKey::UserPosts { author_id };
        self.wait_then(key, &cursor, viewer.scope(), timeout, cancel, || {
            self.load_author_page(author_id, viewer, &cursor)
        })
        .await
    }

    pub async fn wait_for_timeline(
        &self,
        user_id: i64,
        visitor_id: Option<i64>,
        offset_id: i64,
        limit: i64,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> FeedResult<WaitOutcome<Page<AggregateView>>> {
        let cursor = self.cursor(offset_id, limit, Direction::Forward)?;
        let viewer = timeline_viewer(user_id, visitor_id);
        let key = StreamKey::Timeline { user_id };
        self.wait_then(key, &cursor, viewer.scope(), timeout, cancel, || {
            self.load_timeline_page(user_id, viewer, &cursor)
        })
        .await
    }

    /// Fails with `NotFound` up front when the post does not exist.
    pub async fn wait_for_comments(
        &self,
        post_id: i64,
        offset_id: i64,
        limit: i64,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> FeedResult<WaitOutcome<Page<CommentRecord>>> {
        let cursor = self.cursor(offset_id, limit, Direction::Forward)?;
        self.with_store(|repos| require_post(repos, post_id).map(|_| ()))?;
        let key = StreamKey::PostComments { post_id };
        self.wait_then(key, &cursor, PostScope::All, timeout, cancel, || {
            self.load_comment_page(post_id, &cursor)
        })
        .await
    }

    /// True once `key` holds an item past `offset_id` that `scope` lets
    /// through.
    pub fn is_ready_to_advance(
        &self,
        key: StreamKey,
        offset_id: i64,
        scope: PostScope,
    ) -> FeedResult<bool> {
        self.with_store(|repos| {
            let ready = match key {
                StreamKey::UserPosts { author_id } => {
                    repos.posts().has_after_for_author(author_id, offset_id, scope)?
                }
                StreamKey::Timeline { user_id } => {
                    repos.posts().has_after_in_timeline(user_id, offset_id, scope)?
                }
                StreamKey::PostComments { post_id } => {
                    repos.comments().has_after(post_id, offset_id)?
                }
            };
            Ok(ready)
        })
    }

    async fn wait_then<T, F>(
        &self,
        key: StreamKey,
        cursor: &Cursor,
        scope: PostScope,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
        load: F,
    ) -> FeedResult<WaitOutcome<T>>
    where
        F: FnOnce() -> FeedResult<T>,
    {
        let timeout = self.waiter.effective_timeout(timeout);
        let offset_id = cursor.offset_id();
        let state = self
            .waiter
            .wait_until_ready(key, offset_id, timeout, cancel, || {
                self.is_ready_to_advance(key, offset_id, scope)
            })
            .await?;
        Ok(match state {
            WaitState::Ready => WaitOutcome::Ready(load()?),
            WaitState::TimedOut => WaitOutcome::TimedOut,
            WaitState::Cancelled => WaitOutcome::Cancelled,
        })
    }

    pub fn comments(
        &self,
        post_id: i64,
        offset_id: i64,
        limit: i64,
    ) -> FeedResult<Page<CommentRecord>> {
        let cursor = self.cursor(offset_id, limit, Direction::Forward)?;
        self.load_comment_page(post_id, &cursor)
    }

    pub fn add_comment(&self, post_id: i64, user_id: i64, text: String) -> FeedResult<i64> {
        if text.trim().is_empty() {
            return Err(FeedError::invalid("comment text must not be empty"));
        }
        let comment_id = self.with_store(|repos| {
            require_post(repos, post_id)?;
            let user = require_user(repos, user_id)?;
            Ok(repos.comments().create(&NewComment {
                post_id,
                user_id,
                username: user.username,
                text,
                created_date: today_iso(),
                created_time: now_time_iso(),
            })?)
        })?;
        tracing::info!(comment_id, post_id, user_id, "comment added");
        self.notifier.notify();
        Ok(comment_id)
    }

    pub fn delete_comment(&self, comment_id: i64) -> FeedResult<()> {
        let deleted = self.with_store(|repos| Ok(repos.comments().delete(comment_id)?))?;
        if !deleted {
            return Err(FeedError::not_found(format!("comment {comment_id}")));
        }
        tracing::info!(comment_id, "comment deleted");
        self.notifier.notify();
        Ok(())
    }

    /// Returns false when the like already existed.
    pub fn like(&self, post_id: i64, user_id: i64) -> FeedResult<bool> {
        let added = self.with_store(|repos| {
            require_post(repos, post_id)?;
            require_user(repos, user_id)?;
            let created_at = chrono::Utc::now().to_rfc3339();
            Ok(repos.likes().add(post_id, user_id, &created_at)?)
        })?;
        if added {
            tracing::debug!(post_id, user_id, "post liked");
            self.notifier.notify();
        }
        Ok(added)
    }

    pub fn unlike(&self, post_id: i64, user_id: i64) -> FeedResult<bool> {
        let removed = self.with_store(|repos| Ok(repos.likes().remove(post_id, user_id)?))?;
        if removed {
            tracing::debug!(post_id, user_id, "post unliked");
            self.notifier.notify();
        }
        Ok(removed)
    }

    pub fn create_user(&self, user: NewUser) -> FeedResult<UserRecord> {
        let username = user.username.trim().to_string();
        if username.is_empty() {
            return Err(FeedError::invalid("username must not be empty"));
        }
        let record = self.with_store(|repos| {
            let users = repos.users();
            if users.get_by_username(&username)?.is_some() {
                return Err(FeedError::invalid(format!("username {username} is taken")));
            }
            let id = users.create(&NewUser {
                username: username.clone(),
                ..user
            })?;
            users
                .get(id)?
                .ok_or_else(|| FeedError::DataIntegrity(format!("user {id} vanished after insert")))
        })?;
        tracing::info!(user_id = record.id, username = %record.username, "user created");
        Ok(record)
    }

    pub fn user(&self, user_id: i64) -> FeedResult<UserRecord> {
        self.with_store(|repos| require_user(repos, user_id))
    }

    pub fn user_by_username(&self, username: &str) -> FeedResult<UserRecord> {
        self.with_store(|repos| {
            repos
                .users()
                .get_by_username(username)?
                .ok_or_else(|| FeedError::not_found(format!("user {username}")))
        })
    }

    /// Returns false when the edge already existed.
    pub fn follow(&self, follower_id: i64, followee_id: i64) -> FeedResult<bool> {
        if follower_id == followee_id {
            return Err(FeedError::invalid("users cannot follow themselves"));
        }
        let added = self.with_store(|repos| {
            require_user(repos, follower_id)?;
            require_user(repos, followee_id)?;
            Ok(repos.following().follow(FollowEdge {
                follower_id,
                followee_id,
            })?)
        })?;
        if added {
            tracing::info!(follower_id, followee_id, "follow added");
            self.notifier.notify();
        }
        Ok(added)
    }

    pub fn unfollow(&self, follower_id: i64, followee_id: i64) -> FeedResult<bool> {
        let removed = self.with_store(|repos| {
            Ok(repos.following().unfollow(FollowEdge {
                follower_id,
                followee_id,
            })?)
        })?;
        if removed {
            tracing::info!(follower_id, followee_id, "follow removed");
        }
        Ok(removed)
    }

    fn load_author_page(
        &self,
        author_id: i64,
        viewer: Viewer,
        cursor: &Cursor,
    ) -> FeedResult<Page<AggregateView>> {
        self.with_store(|repos| {
            let page = fetch_author_posts(&repos.posts(), author_id, cursor, viewer.scope())?;
            assemble_visible(repos, page, viewer)
        })
    }

    fn load_timeline_page(
        &self,
        user_id: i64,
        viewer: Viewer,
        cursor: &Cursor,
    ) -> FeedResult<Page<AggregateView>> {
        self.with_store(|repos| {
            let page = resolve_timeline(
                &repos.following(),
                &repos.posts(),
                user_id,
                cursor,
                viewer.scope(),
            )?;
            assemble_visible(repos, page, viewer)
        })
    }

    fn load_comment_page(&self, post_id: i64, cursor: &Cursor) -> FeedResult<Page<CommentRecord>> {
        self.with_store(|repos| {
            require_post(repos, post_id)?;
            fetch_post_comments(&repos.comments(), post_id, cursor)
        })
    }

    /// Runs `f` while holding the store once.
    fn with_store<T, F>(&self, f: F) -> FeedResult<T>
    where
        F: FnOnce(&SqliteRepositories<'_>) -> FeedResult<T>,
    {
        Ok(self
            .database
            .with_repositories(|repos| f(&repos).map_err(anyhow::Error::from))?)
    }
}

fn timeline_viewer(user_id: i64, visitor_id: Option<i64>) -> Viewer {
    Viewer::from_visitor_id(visitor_id.unwrap_or(user_id))
}

/// Filters and assembles a page of posts, keeping its `has_more` flag.
fn assemble_visible(
    repos: &SqliteRepositories<'_>,
    page: Page<PostRecord>,
    viewer: Viewer,
) -> FeedResult<Page<AggregateView>> {
    let visible = privacy::filter(page.items, viewer);
    let items = assemble(&repos.users(), &repos.likes(), &repos.comments(), visible)?;
    Ok(Page {
        items,
        has_more: page.has_more,
    })
}

fn require_user(repos: &SqliteRepositories<'_>, user_id: i64) -> FeedResult<UserRecord> {
    repos
        .users()
        .get(user_id)?
        .ok_or_else(|| FeedError::not_found(format!("user {user_id}")))
}

fn require_post(repos: &SqliteRepositories<'_>, post_id: i64) -> FeedResult<PostRecord> {
    repos
        .posts()
        .get(post_id)?
        .ok_or_else(|| FeedError::not_found(format!("post {post_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn service() -> FeedService {
        let config = FeedConfig {
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(5),
            max_concurrent_waiters: 8,
            max_page_size: 50,
        };
        FeedService::new(Database::open_in_memory().unwrap(), &config)
    }

    fn user(service: &FeedService, name: &str) -> i64 {
        service
            .create_user(NewUser {
                username: name.into(),
                first_name: None,
                last_name: None,
            })
            .unwrap()
            .id
    }

    fn post(service: &FeedService, author_id: i64, privacy: bool) -> i64 {
        service
            .add_post(PostDraft {
                author_id,
                text: format!("hello from {author_id}"),
                privacy,
                expandable: false,
            })
            .unwrap()
    }

    fn ids(page: &Page<AggregateView>) -> Vec<i64> {
        page.items.iter().map(|v| v.post.id).collect()
    }

    #[test]
    fn timeline_respects_viewer_privacy() {
        let service = service();
        let a = user(&service, "a");
        let b = user(&service, "b");
        let c = user(&service, "c");
        service.follow(a, b).unwrap();
        service.follow(a, c).unwrap();

        let public = post(&service, b, false);
        let private = post(&service, c, true);

        let anonymous = service.timeline(a, Some(0), 0, 10).unwrap();
        assert_eq!(ids(&anonymous), vec![public]);

        let owner = service.timeline(a, Some(a), 0, 10).unwrap();
        assert_eq!(ids(&owner), vec![public, private]);

        let implicit = service.timeline(a, None, 0, 10).unwrap();
        assert_eq!(ids(&implicit), vec![public, private]);
        assert_eq!(service.timeline_count(a).unwrap(), 2);
    }

    #[test]
    fn user_posts_and_previous_pages() {
        let service = service();
        let alice = user(&service, "alice");
        let created: Vec<i64> = (0..5).map(|_| post(&service, alice, false)).collect();

        let forward = service.user_posts(alice, alice, created[1], 2).unwrap();
        assert_eq!(ids(&forward), vec![created[2], created[3]]);
        assert!(forward.has_more);

        let previous = service.previous_posts(alice, alice, created[3], 10).unwrap();
        assert_eq!(ids(&previous), vec![created[2], created[1], created[0]]);
        assert!(!previous.has_more);

        let previous = service.previous_timeline(alice, None, 0, 10).unwrap();
        assert!(previous.items.is_empty());
    }

    #[test]
    fn bad_paging_input_is_rejected() {
        let service = service();
        assert!(matches!(
            service.user_posts(1, 0, 0, 0),
            Err(FeedError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.timeline(1, None, -5, 10),
            Err(FeedError::InvalidArgument(_))
        ));
    }

    #[test]
    fn post_lifecycle_with_engagement() {
        let service = service();
        let alice = user(&service, "alice");
        let bob = user(&service, "bob");
        let post_id = post(&service, alice, false);

        assert!(service.like(post_id, bob).unwrap());
        assert!(!service.like(post_id, bob).unwrap());
        service.add_comment(post_id, bob, "nice".into()).unwrap();

        let view = service.post_by_id(post_id).unwrap();
        assert_eq!(view.author.username, "alice");
        assert_eq!((view.like_count, view.comment_count), (1, 1));

        let comments = service.comments(post_id, 0, 10).unwrap();
        assert_eq!(comments.items.len(), 1);
        assert_eq!(comments.items[0].username, "bob");

        assert!(service.unlike(post_id, bob).unwrap());
        service.delete_post(post_id).unwrap();
        assert!(matches!(
            service.post_by_id(post_id),
            Err(FeedError::NotFound(_))
        ));
        assert!(matches!(
            service.delete_post(post_id),
            Err(FeedError::NotFound(_))
        ));
    }

    #[test]
    fn write_validation() {
        let service = service();
        let alice = user(&service, "alice");
        assert!(matches!(
            service.add_post(PostDraft {
                author_id: 999,
                text: "ghost".into(),
                privacy: false,
                expandable: false,
            }),
            Err(FeedError::NotFound(_))
        ));
        assert!(matches!(
            service.add_post(PostDraft {
                author_id: alice,
                text: "   ".into(),
                privacy: false,
                expandable: false,
            }),
            Err(FeedError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.follow(alice, alice),
            Err(FeedError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.create_user(NewUser {
                username: "alice".into(),
                first_name: None,
                last_name: None,
            }),
            Err(FeedError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn timeline_wait_wakes_on_new_followee_post() {
        let service = Arc::new(service());
        let a = user(&service, "a");
        let b = user(&service, "b");
        service.follow(a, b).unwrap();
        let first = post(&service, b, false);

        let writer = service.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            writer
                .add_post(PostDraft {
                    author_id: b,
                    text: "fresh".into(),
                    privacy: false,
                    expandable: false,
                })
                .unwrap();
        });

        let outcome = service
            .wait_for_timeline(a, None, first, 10, None, &CancellationToken::new())
            .await
            .unwrap();
        match outcome {
            WaitOutcome::Ready(page) => {
                assert_eq!(page.items.len(), 1);
                assert!(page.items[0].post.id > first);
                assert_eq!(page.items[0].post.text, "fresh");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn anonymous_wait_ignores_private_posts() {
        let service = service();
        let alice = user(&service, "alice");
        let last = post(&service, alice, false);
        post(&service, alice, true);

        let outcome = service
            .wait_for_posts(
                alice,
                0,
                last,
                10,
                Some(Duration::from_millis(100)),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);

        let outcome = service
            .wait_for_posts(
                alice,
                alice,
                last,
                10,
                Some(Duration::from_millis(100)),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, WaitOutcome::Ready(page) if page.items.len() == 1));
    }

    #[tokio::test]
    async fn comment_wait_is_cancellable() {
        let service = service();
        let alice = user(&service, "alice");
        let post_id = post(&service, alice, false);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = service
            .wait_for_comments(post_id, 0, 10, None, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Cancelled);
    }

    #[tokio::test]
    async fn comment_wait_on_missing_post_is_not_found() {
        let service = service();
        let started = std::time::Instant::now();
        let result = service
            .wait_for_comments(999, 0, 10, None, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(FeedError::NotFound(_))));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(service.available_wait_slots(), 8);
    }

    #[tokio::test]
    async fn ready_wait_is_served_while_waiter_is_full() {
        let config = FeedConfig {
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(5),
            max_concurrent_waiters: 1,
            max_page_size: 50,
        };
        let service = Arc::new(FeedService::new(Database::open_in_memory().unwrap(), &config));
        let alice = user(&service, "alice");
        let bob = user(&service, "bob");
        let last = post(&service, alice, false);
        let bobs = post(&service, bob, false);

        let cancel = CancellationToken::new();
        let parked = {
            let service = service.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                service
                    .wait_for_posts(alice, alice, last, 10, None, &cancel)
                    .await
            })
        };
        while service.available_wait_slots() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let outcome = service
            .wait_for_posts(bob, bob, 0, 10, None, &cancel)
            .await
            .unwrap();
        match outcome {
            WaitOutcome::Ready(page) => assert_eq!(ids(&page), vec![bobs]),
            other => panic!("unexpected outcome: {other:?}"),
        }

        cancel.cancel();
        assert_eq!(parked.await.unwrap().unwrap(), WaitOutcome::Cancelled);
    }
}
