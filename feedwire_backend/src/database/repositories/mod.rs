mod comments;
mod following;
mod likes;
mod posts;
mod users;

use super::models::{
    CommentRecord, FollowEdge, NewComment, NewPost, NewUser, PostRecord, UserRecord,
};
use anyhow::Result;
use rusqlite::Connection;
use std::collections::HashMap;

/// Which side of an id a page is taken from.
///
/// `After` pages come back ascending by id; `Before` and `Latest` pages come
/// back newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdBound {
    After(i64),
    Before(i64),
    Latest,
}

/// Storage-level visibility predicate for post queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope {
    All,
    PublicOnly,
}

pub trait PostRepository {
    fn create(&self, post: &NewPost) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<PostRecord>>;
    fn delete(&self, id: i64) -> Result<bool>;
    fn page_by_author(
        &self,
        author_id: i64,
        bound: IdBound,
        scope: PostScope,
        limit: u32,
    ) -> Result<Vec<PostRecord>>;
    fn has_after_for_author(
        &self,
        author_id: i64,
        offset_id: i64,
        scope: PostScope,
    ) -> Result<bool>;
    fn has_after_in_timeline(
        &self,
        user_id: i64,
        offset_id: i64,
        scope: PostScope,
    ) -> Result<bool>;
    fn count_in_timeline(&self, user_id: i64) -> Result<i64>;
}

pub trait UserRepository {
    fn create(&self, user: &NewUser) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<UserRecord>>;
    fn get_many(&self, ids: &[i64]) -> Result<Vec<UserRecord>>;
    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
}

pub trait LikeRepository {
    /// Returns false when the user already liked the post.
    fn add(&self, post_id: i64, user_id: i64, created_at: &str) -> Result<bool>;
    fn remove(&self, post_id: i64, user_id: i64) -> Result<bool>;
    /// Returns HashMap<post_id, count>; posts without likes are absent.
    fn count_for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>>;
}

pub trait CommentRepository {
    fn create(&self, comment: &NewComment) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<CommentRecord>>;
    fn delete(&self, id: i64) -> Result<bool>;
    fn page_for_post(
        &self,
        post_id: i64,
        bound: IdBound,
        limit: u32,
    ) -> Result<Vec<CommentRecord>>;
    fn has_after(&self, post_id: i64, offset_id: i64) -> Result<bool>;
    /// Returns HashMap<post_id, count>; posts without comments are absent.
    fn count_for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>>;
}

pub trait FollowingRepository {
    /// Returns false when the edge already existed.
    fn follow(&self, edge: FollowEdge) -> Result<bool>;
    fn unfollow(&self, edge: FollowEdge) -> Result<bool>;
    fn followees_of(&self, follower_id: i64) -> Result<Vec<i64>>;
    fn is_following(&self, edge: FollowEdge) -> Result<bool>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn likes(&self) -> impl LikeRepository + '_ {
        likes::SqliteLikeRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn following(&self) -> impl FollowingRepository + '_ {
        following::SqliteFollowingRepository { conn: self.conn }
    }
}

/// `?, ?, ?` for an `IN (...)` list of `n` values.
pub(super) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Runs a `SELECT key, COUNT(*) ... GROUP BY key` query over an id list.
pub(super) fn grouped_counts(
    conn: &Connection,
    sql: &str,
    ids: &[i64],
) -> Result<HashMap<i64, i64>> {
    let mut counts = HashMap::with_capacity(ids.len());
    if ids.is_empty() {
        return Ok(counts);
    }
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (id, count) = row?;
        counts.insert(id, count);
    }
    Ok(counts)
}
