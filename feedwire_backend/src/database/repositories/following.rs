use crate::database::models::FollowEdge;
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteFollowingRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::FollowingRepository for SqliteFollowingRepository<'conn> {
    fn follow(&self, edge: FollowEdge) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO follows (follower_id, followee_id)
            VALUES (?1, ?2)
            "#,
            params![edge.follower_id, edge.followee_id],
        )?;
        Ok(inserted > 0)
    }

    fn unfollow(&self, edge: FollowEdge) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![edge.follower_id, edge.followee_id],
        )?;
        Ok(removed > 0)
    }

    fn followees_of(&self, follower_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT followee_id
            FROM follows
            WHERE follower_id = ?1
            ORDER BY followee_id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![follower_id], |row| row.get::<_, i64>(0))?;
        let mut followees = Vec::new();
        for row in rows {
            followees.push(row?);
        }
        Ok(followees)
    }

    fn is_following(&self, edge: FollowEdge) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followee_id = ?2)",
            params![edge.follower_id, edge.followee_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}
