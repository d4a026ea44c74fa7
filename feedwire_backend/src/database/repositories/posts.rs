use super::{IdBound, PostScope};
use crate::database::models::{NewPost, PostRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

const POST_COLUMNS: &str =
    "id, author_id, text, created_date, created_time, privacy, expandable";

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        author_id: row.get(1)?,
        text: row.get(2)?,
        created_date: row.get(3)?,
        created_time: row.get(4)?,
        privacy: row.get(5)?,
        expandable: row.get(6)?,
    })
}

fn scope_clause(scope: PostScope) -> &'static str {
    match scope {
        PostScope::All => "",
        PostScope::PublicOnly => "AND privacy = 0",
    }
}

impl<'conn> super::PostRepository for SqlitePostRepository<'conn> {
    fn create(&self, post: &NewPost) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO posts (author_id, text, created_date, created_time, privacy, expandable)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                post.author_id,
                post.text,
                post.created_date,
                post.created_time,
                post.privacy,
                post.expandable
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<PostRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                params![id],
                map_post,
            )
            .optional()?)
    }

    fn delete(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn page_by_author(
        &self,
        author_id: i64,
        bound: IdBound,
        scope: PostScope,
        limit: u32,
    ) -> Result<Vec<PostRecord>> {
        let scope = scope_clause(scope);
        let (predicate, order, pivot) = match bound {
            IdBound::After(id) => ("AND id > ?2", "ASC", id),
            IdBound::Before(id) => ("AND id < ?2", "DESC", id),
            IdBound::Latest => ("AND id < ?2", "DESC", i64::MAX),
        };
        let sql = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE author_id = ?1 {predicate} {scope}
            ORDER BY id {order}
            LIMIT ?3
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![author_id, pivot, limit], map_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    fn has_after_for_author(
        &self,
        author_id: i64,
        offset_id: i64,
        scope: PostScope,
    ) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE author_id = ?1 AND id > ?2 {})",
            scope_clause(scope)
        );
        let exists: bool = self
            .conn
            .query_row(&sql, params![author_id, offset_id], |row| row.get(0))?;
        Ok(exists)
    }

    fn has_after_in_timeline(
        &self,
        user_id: i64,
        offset_id: i64,
        scope: PostScope,
    ) -> Result<bool> {
        let sql = format!(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM posts
                INNER JOIN follows ON follows.followee_id = posts.author_id
                WHERE follows.follower_id = ?1 AND posts.id > ?2 {}
            )
            "#,
            scope_clause(scope)
        );
        let exists: bool = self
            .conn
            .query_row(&sql, params![user_id, offset_id], |row| row.get(0))?;
        Ok(exists)
    }

    fn count_in_timeline(&self, user_id: i64) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM posts
            INNER JOIN follows ON follows.followee_id = posts.author_id
            WHERE follows.follower_id = ?1
            "#,
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
