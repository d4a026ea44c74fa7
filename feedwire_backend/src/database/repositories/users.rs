use super::placeholders;
use crate::database::models::{NewUser, UserRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteUserRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
    })
}

impl<'conn> super::UserRepository for SqliteUserRepository<'conn> {
    fn create(&self, user: &NewUser) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO users (username, first_name, last_name)
            VALUES (?1, ?2, ?3)
            "#,
            params![user.username, user.first_name, user.last_name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, username, first_name, last_name FROM users WHERE id = ?1",
                params![id],
                map_user,
            )
            .optional()?)
    }

    fn get_many(&self, ids: &[i64]) -> Result<Vec<UserRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, username, first_name, last_name FROM users WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), map_user)?;
        let mut users = Vec::with_capacity(ids.len());
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, username, first_name, last_name FROM users WHERE username = ?1",
                params![username],
                map_user,
            )
            .optional()?)
    }
}
