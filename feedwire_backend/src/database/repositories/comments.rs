use super::{grouped_counts, placeholders, IdBound};
use crate::database::models::{CommentRecord, NewComment};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

const COMMENT_COLUMNS: &str =
    "id, post_id, user_id, username, text, created_date, created_time";

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        text: row.get(4)?,
        created_date: row.get(5)?,
        created_time: row.get(6)?,
    })
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, comment: &NewComment) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO comments (post_id, user_id, username, text, created_date, created_time)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                comment.post_id,
                comment.user_id,
                comment.username,
                comment.text,
                comment.created_date,
                comment.created_time
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<CommentRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
                params![id],
                map_comment,
            )
            .optional()?)
    }

    fn delete(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn page_for_post(
        &self,
        post_id: i64,
        bound: IdBound,
        limit: u32,
    ) -> Result<Vec<CommentRecord>> {
        let (predicate, order, pivot) = match bound {
            IdBound::After(id) => ("id > ?2", "ASC", id),
            IdBound::Before(id) => ("id < ?2", "DESC", id),
            IdBound::Latest => ("id < ?2", "DESC", i64::MAX),
        };
        let sql = format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM comments
            WHERE post_id = ?1 AND {predicate}
            ORDER BY id {order}
            LIMIT ?3
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![post_id, pivot, limit], map_comment)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    fn has_after(&self, post_id: i64, offset_id: i64) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM comments WHERE post_id = ?1 AND id > ?2)",
            params![post_id, offset_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn count_for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        let sql = format!(
            r#"
            SELECT post_id, COUNT(*)
            FROM comments
            WHERE post_id IN ({})
            GROUP BY post_id
            "#,
            placeholders(post_ids.len())
        );
        grouped_counts(self.conn, &sql, post_ids)
    }
}
