//! Ephemeral stories: 24h media posts with unique-viewer tracking.
//!
//! Expiry is enforced at read time by comparing `expires_at` against the
//! current unix time; expired rows stay in the table until deleted by
//! their owner.

use anyhow::{Context, Result};
use sqlx::Row;
use uuid::Uuid;

use super::{now, Database};
use crate::models::{StoryGroup, StoryItem, StoryViewerView, UserSummary};

impl Database {
    /// Inserts a story. The expiry is passed in so callers control the
    /// lifetime (normally now + 24h).
    pub async fn create_story(
        &self,
        user_id: i64,
        media_url: &str,
        media_type: &str,
        caption: Option<&str>,
        expires_at: i64,
    ) -> Result<(i64, String)> {
        let uuid = Uuid::new_v4().to_string();
        let result = sqlx::query(
            "INSERT INTO stories (uuid, user_id, media_url, media_type, caption, views_count, \
             created_at, expires_at) VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&uuid)
        .bind(user_id)
        .bind(media_url)
        .bind(media_type)
        .bind(caption)
        .bind(now())
        .bind(expires_at)
        .execute(self.pool())
        .await
        .context("Failed to insert story")?;
        Ok((result.last_insert_rowid(), uuid))
    }

    /// Active stories from the viewer and accepted-friendship peers,
    /// grouped per author with the viewer's own group first. Stories
    /// within a group run newest first.
    pub async fn stories_feed(&self, viewer: i64) -> Result<Vec<StoryGroup>> {
        let rows = sqlx::query(
            "SELECT s.id, s.uuid, s.media_url, s.media_type, s.caption, s.views_count, \
                    s.created_at, s.expires_at, \
                    u.id AS author_id, u.uuid AS author_uuid, u.username, u.full_name, \
                    u.profile_picture, u.is_verified, \
                    EXISTS(SELECT 1 FROM story_views \
                           WHERE story_id = s.id AND viewer_id = ?) AS is_viewed \
             FROM stories s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.expires_at > ? \
               AND (s.user_id = ? \
                    OR s.user_id IN ( \
                        SELECT CASE \
                            WHEN requester_id = ? THEN addressee_id \
                            ELSE requester_id \
                        END \
                        FROM friendships \
                        WHERE (requester_id = ? OR addressee_id = ?) AND status = 'accepted')) \
             ORDER BY (s.user_id = ?) DESC, u.username ASC, s.created_at DESC, s.id DESC",
        )
        .bind(viewer)
        .bind(now())
        .bind(viewer)
        .bind(viewer)
        .bind(viewer)
        .bind(viewer)
        .bind(viewer)
        .fetch_all(self.pool())
        .await
        .context("Failed to query stories feed")?;

        let mut groups: Vec<StoryGroup> = Vec::new();
        for row in &rows {
            let author_id: i64 = row.get("author_id");
            let story = StoryItem {
                id: row.get("id"),
                uuid: row.get("uuid"),
                media_url: row.get("media_url"),
                media_type: row.get("media_type"),
                caption: row.get("caption"),
                views_count: row.get("views_count"),
                is_viewed: row.get::<i64, _>("is_viewed") != 0,
                created_at: row.get("created_at"),
                expires_at: row.get("expires_at"),
            };
            match groups.last_mut() {
                Some(group) if group.user.id == author_id => group.stories.push(story),
                _ => groups.push(StoryGroup {
                    user: UserSummary {
                        id: author_id,
                        uuid: row.get("author_uuid"),
                        username: row.get("username"),
                        full_name: row.get("full_name"),
                        profile_picture: row.get("profile_picture"),
                        is_verified: row.get::<i64, _>("is_verified") != 0,
                    },
                    stories: vec![story],
                }),
            }
        }
        Ok(groups)
    }

    /// Resolves an active story reference (id or uuid) to (id, owner).
    /// Expired stories resolve to `None`.
    pub async fn resolve_story(&self, reference: &str) -> Result<Option<(i64, i64)>> {
        let row = sqlx::query(
            "SELECT id, user_id FROM stories WHERE (id = ? OR uuid = ?) AND expires_at > ?",
        )
        .bind(reference)
        .bind(reference)
        .bind(now())
        .fetch_optional(self.pool())
        .await
        .context("Failed to resolve story")?;
        Ok(row.map(|row| (row.get("id"), row.get("user_id"))))
    }

    /// Records a view. The views counter only moves when this viewer has
    /// not seen the story before, so it counts unique viewers. Returns
    /// false when the story is missing or expired.
    pub async fn view_story(&self, viewer: i64, reference: &str) -> Result<bool> {
        let Some((story_id, _)) = self.resolve_story(reference).await? else {
            return Ok(false);
        };

        let mut tx = self.pool().begin().await.context("Failed to begin tx")?;
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO story_views (story_id, viewer_id, viewed_at) VALUES (?, ?, ?)",
        )
        .bind(story_id)
        .bind(viewer)
        .bind(now())
        .execute(&mut *tx)
        .await
        .context("Failed to insert story view")?;

        if inserted.rows_affected() > 0 {
            sqlx::query("UPDATE stories SET views_count = views_count + 1 WHERE id = ?")
                .bind(story_id)
                .execute(&mut *tx)
                .await
                .context("Failed to bump views count")?;
        }

        tx.commit().await.context("Failed to commit story view")?;
        Ok(true)
    }

    /// Viewer list for one story, most recent view first. Owner checks
    /// happen in the handler via [`Database::resolve_story`].
    pub async fn story_viewers(&self, story_id: i64) -> Result<Vec<StoryViewerView>> {
        let rows = sqlx::query(
            "SELECT u.id, u.username, u.full_name, u.profile_picture, v.viewed_at \
             FROM story_views v \
             JOIN users u ON u.id = v.viewer_id \
             WHERE v.story_id = ? \
             ORDER BY v.viewed_at DESC, u.id DESC",
        )
        .bind(story_id)
        .fetch_all(self.pool())
        .await
        .context("Failed to query story viewers")?;

        Ok(rows
            .iter()
            .map(|row| StoryViewerView {
                id: row.get("id"),
                username: row.get("username"),
                full_name: row.get("full_name"),
                profile_picture: row.get("profile_picture"),
                viewed_at: row.get("viewed_at"),
            })
            .collect())
    }

    /// Owner-only delete by id or uuid. Returns the media url of the
    /// removed story so the file can be cleaned up, or `None` when the
    /// story is missing or owned by someone else.
    pub async fn delete_story(&self, owner: i64, reference: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT id, media_url FROM stories WHERE (id = ? OR uuid = ?) AND user_id = ?",
        )
        .bind(reference)
        .bind(reference)
        .bind(owner)
        .fetch_optional(self.pool())
        .await
        .context("Failed to query story")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let story_id: i64 = row.get("id");
        let media_url: String = row.get("media_url");

        sqlx::query("DELETE FROM stories WHERE id = ?")
            .bind(story_id)
            .execute(self.pool())
            .await
            .context("Failed to delete story")?;
        Ok(Some(media_url))
    }
}
