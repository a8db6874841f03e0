use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::{helpers::format_datetime, Database};

// Per (group, user) sync cursor. Cleared together with the cached rows.
impl Database {
    /// RFC 3339 time of the last remote fetch whose results were cached.
    pub async fn sync_token(&self, group_id: &str, user_name: &str) -> Result<Option<String>> {
        let group_id = group_id.to_string();
        let user_name = user_name.to_string();
        self.execute(move |conn| {
            conn.query_row(
                "SELECT token FROM sync_tokens WHERE group_id = ?1 AND user_name = ?2",
                params![group_id, user_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
        })
        .await
    }

    pub async fn set_sync_token(&self, group_id: &str, user_name: &str, token: &str) -> Result<()> {
        let group_id = group_id.to_string();
        let user_name = user_name.to_string();
        let token = token.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sync_tokens (group_id, user_name, token, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(group_id, user_name) DO UPDATE SET
                     token = excluded.token,
                     updated_at = excluded.updated_at",
                params![group_id, user_name, token, format_datetime(&Utc::now())],
            )?;
            Ok(())
        })
        .await
    }
}
