// Hindu Unity - A community platform for members, volunteers and leaders
// Copyright (C) 2025 Hindu Unity Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Cache module for local data storage
//!
//! Uses SQLite to keep the signed-in session, user preferences and a
//! snapshot of the first feed page across restarts.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::models::{FeedItem, StoredSession};

/// Settings key of the video mute preference
pub const VIDEO_MUTED_KEY: &str = "video_muted";

/// Cache manager for local data storage
pub struct CacheManager {
    pool: SqlitePool,
}

impl CacheManager {
    /// Open (or create) the cache database at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", path.display());

        info!("Opening cache database at {}", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .context("Failed to open cache database")?;

        let manager = Self { pool };
        manager.init_schema().await?;

        Ok(manager)
    }

    async fn init_schema(&self) -> Result<()> {
        debug!("Initializing cache schema");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                user_id TEXT PRIMARY KEY,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS cached_feed (
                item_key TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                data TEXT NOT NULL,
                cached_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_cached_feed_position ON cached_feed(position);
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Cache schema initialized");

        Ok(())
    }

    /// Drop feed snapshot rows older than `max_age_days`
    pub async fn cleanup(&self, max_age_days: u32) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM cached_feed
            WHERE cached_at < datetime('now', '-' || ? || ' days')
            "#,
        )
        .bind(max_age_days)
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!("Cleaned up {} old feed items", deleted);
        }

        Ok(deleted)
    }

    // ===== SESSION =====

    /// Persist the session, replacing any previous one
    pub async fn save_session(&self, session: &StoredSession) -> Result<()> {
        let data = serde_json::to_string(session)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM sessions WHERE user_id != ?")
            .bind(&session.user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO sessions (user_id, access_token, refresh_token, data, updated_at)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(user_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                data = excluded.data,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&session.user_id)
        .bind(&session.access_token)
        .bind(&session.refresh_token)
        .bind(&data)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!("Saved session for {}", session.user_id);
        Ok(())
    }

    /// The stored session, if any
    pub async fn load_session(&self) -> Result<Option<StoredSession>> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT data, access_token, refresh_token FROM sessions ORDER BY updated_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((data, access_token, refresh_token)) => {
                let mut session: StoredSession = serde_json::from_str(&data)?;
                // tokens are skipped when serializing
                session.access_token = access_token;
                session.refresh_token = refresh_token;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    pub async fn clear_session(&self) -> Result<()> {
        sqlx::query("DELETE FROM sessions")
            .execute(&self.pool)
            .await?;

        info!("Cleared stored session");
        Ok(())
    }

    // ===== SETTINGS =====

    /// Get a setting value
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(v,)| v))
    }

    /// Set a setting value
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        debug!("Set setting {} = {}", key, value);
        Ok(())
    }

    pub async fn get_all_settings(&self) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().collect())
    }

    /// Video mute preference; videos start muted until changed
    pub async fn video_muted(&self) -> Result<bool> {
        Ok(self
            .get_setting(VIDEO_MUTED_KEY)
            .await?
            .map(|v| v != "false")
            .unwrap_or(true))
    }

    pub async fn set_video_muted(&self, muted: bool) -> Result<()> {
        self.set_setting(VIDEO_MUTED_KEY, if muted { "true" } else { "false" })
            .await
    }

    // ===== FEED SNAPSHOT =====

    /// Replace the feed snapshot with `items`
    pub async fn save_feed_snapshot(&self, items: &[FeedItem]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cached_feed")
            .execute(&mut *tx)
            .await?;

        for (position, item) in items.iter().enumerate() {
            let data = serde_json::to_string(item)?;
            sqlx::query("INSERT INTO cached_feed (item_key, position, data) VALUES (?, ?, ?)")
                .bind(item.key())
                .bind(position as i64)
                .bind(&data)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!("Cached {} feed items", items.len());
        Ok(())
    }

    /// The cached feed snapshot in display order
    pub async fn load_feed_snapshot(&self) -> Result<Vec<FeedItem>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT data FROM cached_feed ORDER BY position ASC")
                .fetch_all(&self.pool)
                .await?;

        let items = rows
            .into_iter()
            .filter_map(|(data,)| match serde_json::from_str(&data) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("Skipping unreadable cached feed item: {}", e);
                    None
                }
            })
            .collect();

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    async fn open_temp() -> (TempDir, CacheManager) {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::open(&dir.path().join("nested").join("cache.db"))
            .await
            .unwrap();
        (dir, cache)
    }

    fn session(user: &str, token: &str) -> StoredSession {
        StoredSession {
            user_id: user.to_string(),
            email: Some(format!("{}@example.org", user)),
            access_token: token.to_string(),
            refresh_token: format!("refresh-{}", token),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            created_at: Utc::now(),
        }
    }

    fn post_item(id: &str) -> FeedItem {
        FeedItem::Post(
            serde_json::from_value(serde_json::json!({
                "id": id,
                "user_id": "u1",
                "content": "hello",
                "post_type": "text",
                "created_at": "2025-03-01T10:00:00Z"
            }))
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn session_round_trip_restores_tokens() {
        let (_dir, cache) = open_temp().await;
        assert!(cache.load_session().await.unwrap().is_none());

        assert_ok!(cache.save_session(&session("u1", "a")).await);
        assert_ok!(cache.save_session(&session("u1", "b")).await);

        let stored = cache.load_session().await.unwrap().unwrap();
        assert_eq!(stored.user_id, "u1");
        assert_eq!(stored.access_token, "b");
        assert_eq!(stored.refresh_token, "refresh-b");

        assert_ok!(cache.clear_session().await);
        assert!(cache.load_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn new_user_replaces_previous_session() {
        let (_dir, cache) = open_temp().await;
        cache.save_session(&session("u1", "a")).await.unwrap();
        cache.save_session(&session("u2", "c")).await.unwrap();

        let stored = cache.load_session().await.unwrap().unwrap();
        assert_eq!(stored.user_id, "u2");
    }

    #[tokio::test]
    async fn mute_preference_defaults_to_muted() {
        let (_dir, cache) = open_temp().await;
        assert!(cache.video_muted().await.unwrap());

        cache.set_video_muted(false).await.unwrap();
        assert!(!cache.video_muted().await.unwrap());
        assert_eq!(
            cache.get_all_settings().await.unwrap().get(VIDEO_MUTED_KEY).map(String::as_str),
            Some("false")
        );
    }

    #[tokio::test]
    async fn feed_snapshot_keeps_order() {
        let (_dir, cache) = open_temp().await;
        cache
            .save_feed_snapshot(&[post_item("b"), post_item("a")])
            .await
            .unwrap();

        let items = cache.load_feed_snapshot().await.unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id().to_string()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        cache.save_feed_snapshot(&[post_item("c")]).await.unwrap();
        assert_eq!(cache.load_feed_snapshot().await.unwrap().len(), 1);
        assert_eq!(cache.cleanup(30).await.unwrap(), 0);
    }
}
