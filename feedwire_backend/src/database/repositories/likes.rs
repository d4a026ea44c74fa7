use super::{grouped_counts, placeholders};
use anyhow::Result;
use rusqlite::{params, Connection};
use std::collections::HashMap;

pub(super) struct SqliteLikeRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::LikeRepository for SqliteLikeRepository<'conn> {
    fn add(&self, post_id: i64, user_id: i64, created_at: &str) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO likes (post_id, user_id, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![post_id, user_id, created_at],
        )?;
        Ok(inserted > 0)
    }

    fn remove(&self, post_id: i64, user_id: i64) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        Ok(removed > 0)
    }

    fn count_for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        let sql = format!(
            r#"
            SELECT post_id, COUNT(*)
            FROM likes
            WHERE post_id IN ({})
            GROUP BY post_id
            "#,
            placeholders(post_ids.len())
        );
        grouped_counts(self.conn, &sql, post_ids)
    }
}
