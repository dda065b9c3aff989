//! Posts, comments, likes, saved posts and hashtags.
//!
//! Counts on posts are always live-counted from the likes and comments
//! tables; no stored counters exist, so the numbers cannot drift. Feed
//! visibility is the friendship scope: the viewer's own posts plus posts
//! by accepted-friendship peers.

use anyhow::{Context, Result};
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use super::{now, Database};
use crate::models::{CommentView, PostView};

/// Extracts `#word` hashtags from post content, lowercased, without the
/// leading `#`. Duplicates within one post are kept single.
pub fn extract_hashtags(content: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut chars = content.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        if c != '#' {
            continue;
        }
        let rest = &content[index + 1..];
        let tag: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if tag.is_empty() {
            continue;
        }
        for _ in 0..tag.chars().count() {
            chars.next();
        }
        let tag = tag.to_lowercase();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    tags
}

/// SQL fragment selecting post rows with author profile, live counts and
/// per-viewer flags. Binds, in order: viewer, viewer (for the flags).
const POST_COLUMNS: &str = "p.id, p.uuid, p.user_id, p.content, p.image_url, p.video_url, \
     p.privacy, p.created_at, \
     u.username, u.full_name, u.profile_picture, u.is_verified, \
     (SELECT COUNT(*) FROM likes WHERE post_id = p.id) AS likes_count, \
     (SELECT COUNT(*) FROM comments WHERE post_id = p.id) AS comments_count, \
     EXISTS(SELECT 1 FROM likes WHERE post_id = p.id AND user_id = ?) AS is_liked, \
     EXISTS(SELECT 1 FROM saved_posts WHERE post_id = p.id AND user_id = ?) AS is_saved";

fn map_post_row(row: &sqlx::sqlite::SqliteRow) -> PostView {
    PostView {
        id: row.get("id"),
        uuid: row.get("uuid"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        image_url: row.get("image_url"),
        video_url: row.get("video_url"),
        privacy: row.get("privacy"),
        created_at: row.get("created_at"),
        username: row.get("username"),
        full_name: row.get("full_name"),
        profile_picture: row.get("profile_picture"),
        is_verified: row.get::<i64, _>("is_verified") != 0,
        likes_count: row.get("likes_count"),
        comments_count: row.get("comments_count"),
        is_liked: row.get::<i64, _>("is_liked") != 0,
        is_saved: row.get::<i64, _>("is_saved") != 0,
    }
}

impl Database {
    /// Inserts a post and its hashtag links in one transaction. Returns
    /// the new post id and uuid.
    pub async fn create_post(
        &self,
        user_id: i64,
        content: Option<&str>,
        image_url: Option<&str>,
        video_url: Option<&str>,
        privacy: &str,
    ) -> Result<(i64, String)> {
        let uuid = Uuid::new_v4().to_string();
        let mut tx = self.pool().begin().await.context("Failed to begin tx")?;

        let result = sqlx::query(
            "INSERT INTO posts (uuid, user_id, content, image_url, video_url, privacy, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(user_id)
        .bind(content)
        .bind(image_url)
        .bind(video_url)
        .bind(privacy)
        .bind(now())
        .execute(&mut *tx)
        .await
        .context("Failed to insert post")?;

        let post_id = result.last_insert_rowid();

        if let Some(content) = content {
            for tag in extract_hashtags(content) {
                link_hashtag(&mut tx, post_id, &tag).await?;
            }
        }

        tx.commit().await.context("Failed to commit post")?;
        Ok((post_id, uuid))
    }

    /// Feed page: posts by the viewer or accepted-friendship peers, newest
    /// first. Fetches one row beyond the page for a precise `has_more`.
    pub async fn feed(
        &self,
        viewer: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PostView>, bool)> {
        let sql = format!(
            "SELECT {POST_COLUMNS} \
             FROM posts p \
             JOIN users u ON u.id = p.user_id \
             WHERE p.user_id = ? \
                OR p.user_id IN ( \
                    SELECT CASE \
                        WHEN requester_id = ? THEN addressee_id \
                        ELSE requester_id \
                    END \
                    FROM friendships \
                    WHERE (requester_id = ? OR addressee_id = ?) AND status = 'accepted') \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT ? OFFSET ?"
        );

        let rows = sqlx::query(&sql)
            .bind(viewer)
            .bind(viewer)
            .bind(viewer)
            .bind(viewer)
            .bind(viewer)
            .bind(viewer)
            .bind(limit + 1)
            .bind(offset)
            .fetch_all(self.pool())
            .await
            .context("Failed to query feed")?;

        let has_more = rows.len() as i64 > limit;
        let posts = rows
            .iter()
            .take(limit as usize)
            .map(map_post_row)
            .collect();
        Ok((posts, has_more))
    }

    /// Single post by numeric id or uuid. Anonymous viewers get false
    /// per-viewer flags. The stored privacy field is not enforced here.
    pub async fn get_post(&self, reference: &str, viewer: Option<i64>) -> Result<Option<PostView>> {
        let viewer = viewer.unwrap_or(0);
        let sql = format!(
            "SELECT {POST_COLUMNS} \
             FROM posts p \
             JOIN users u ON u.id = p.user_id \
             WHERE p.id = ? OR p.uuid = ?"
        );

        let row = sqlx::query(&sql)
            .bind(viewer)
            .bind(viewer)
            .bind(reference)
            .bind(reference)
            .fetch_optional(self.pool())
            .await
            .context("Failed to query post")?;

        Ok(row.as_ref().map(map_post_row))
    }

    /// One author's posts, newest first, no friendship check.
    pub async fn user_posts(
        &self,
        username: &str,
        viewer: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PostView>, bool)> {
        let viewer = viewer.unwrap_or(0);
        let sql = format!(
            "SELECT {POST_COLUMNS} \
             FROM posts p \
             JOIN users u ON u.id = p.user_id \
             WHERE u.username = ? \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT ? OFFSET ?"
        );

        let rows = sqlx::query(&sql)
            .bind(viewer)
            .bind(viewer)
            .bind(username)
            .bind(limit + 1)
            .bind(offset)
            .fetch_all(self.pool())
            .await
            .context("Failed to query user posts")?;

        let has_more = rows.len() as i64 > limit;
        let posts = rows
            .iter()
            .take(limit as usize)
            .map(map_post_row)
            .collect();
        Ok((posts, has_more))
    }

    /// Resolves a post reference (numeric id or uuid) to (id, author).
    pub async fn resolve_post(&self, reference: &str) -> Result<Option<(i64, i64)>> {
        let row = sqlx::query("SELECT id, user_id FROM posts WHERE id = ? OR uuid = ?")
            .bind(reference)
            .bind(reference)
            .fetch_optional(self.pool())
            .await
            .context("Failed to resolve post")?;
        Ok(row.map(|row| (row.get("id"), row.get("user_id"))))
    }

    /// Like toggle. Returns the new liked state, or `None` when the post
    /// does not exist. Liking someone else's post notifies the author in
    /// the same transaction.
    pub async fn toggle_like(&self, viewer: i64, reference: &str) -> Result<Option<bool>> {
        let Some((post_id, author_id)) = self.resolve_post(reference).await? else {
            return Ok(None);
        };

        let existing = sqlx::query("SELECT id FROM likes WHERE user_id = ? AND post_id = ?")
            .bind(viewer)
            .bind(post_id)
            .fetch_optional(self.pool())
            .await
            .context("Failed to check like")?;

        if existing.is_some() {
            sqlx::query("DELETE FROM likes WHERE user_id = ? AND post_id = ?")
                .bind(viewer)
                .bind(post_id)
                .execute(self.pool())
                .await
                .context("Failed to remove like")?;
            return Ok(Some(false));
        }

        let mut tx = self.pool().begin().await.context("Failed to begin tx")?;
        sqlx::query("INSERT INTO likes (user_id, post_id, created_at) VALUES (?, ?, ?)")
            .bind(viewer)
            .bind(post_id)
            .bind(now())
            .execute(&mut *tx)
            .await
            .context("Failed to insert like")?;

        if author_id != viewer {
            super::notifications::insert_notification(
                &mut tx,
                author_id,
                "like",
                Some(post_id),
                Some(viewer),
                None,
            )
            .await?;
        }

        tx.commit().await.context("Failed to commit like")?;
        Ok(Some(true))
    }

    /// Save toggle. Returns the new saved state, or `None` when the post
    /// does not exist.
    pub async fn toggle_save(&self, viewer: i64, reference: &str) -> Result<Option<bool>> {
        let Some((post_id, _)) = self.resolve_post(reference).await? else {
            return Ok(None);
        };

        let existing = sqlx::query("SELECT id FROM saved_posts WHERE user_id = ? AND post_id = ?")
            .bind(viewer)
            .bind(post_id)
            .fetch_optional(self.pool())
            .await
            .context("Failed to check saved post")?;

        if existing.is_some() {
            sqlx::query("DELETE FROM saved_posts WHERE user_id = ? AND post_id = ?")
                .bind(viewer)
                .bind(post_id)
                .execute(self.pool())
                .await
                .context("Failed to remove saved post")?;
            return Ok(Some(false));
        }

        sqlx::query("INSERT INTO saved_posts (user_id, post_id, created_at) VALUES (?, ?, ?)")
            .bind(viewer)
            .bind(post_id)
            .bind(now())
            .execute(self.pool())
            .await
            .context("Failed to insert saved post")?;
        Ok(Some(true))
    }

    /// Inserts a comment and notifies the post author (suppressed for
    /// self-comments) in one transaction. Returns the comment id and uuid,
    /// or `None` when the post does not exist.
    pub async fn add_comment(
        &self,
        viewer: i64,
        reference: &str,
        content: &str,
        parent_comment_id: Option<i64>,
    ) -> Result<Option<(i64, String)>> {
        let Some((post_id, author_id)) = self.resolve_post(reference).await? else {
            return Ok(None);
        };

        let uuid = Uuid::new_v4().to_string();
        let mut tx = self.pool().begin().await.context("Failed to begin tx")?;

        let result = sqlx::query(
            "INSERT INTO comments (uuid, post_id, user_id, parent_comment_id, content, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(post_id)
        .bind(viewer)
        .bind(parent_comment_id)
        .bind(content)
        .bind(now())
        .execute(&mut *tx)
        .await
        .context("Failed to insert comment")?;

        if author_id != viewer {
            let preview: String = content.chars().take(100).collect();
            super::notifications::insert_notification(
                &mut tx,
                author_id,
                "comment",
                Some(post_id),
                Some(viewer),
                Some(&preview),
            )
            .await?;
        }

        tx.commit().await.context("Failed to commit comment")?;
        Ok(Some((result.last_insert_rowid(), uuid)))
    }

    /// Flat chronological comment list with live like counts and the
    /// viewer's own like flag. The threading column is stored but not used
    /// for nesting here.
    pub async fn comments(&self, reference: &str, viewer: Option<i64>) -> Result<Vec<CommentView>> {
        let viewer = viewer.unwrap_or(0);
        let rows = sqlx::query(
            "SELECT c.id, c.uuid, c.post_id, c.user_id, c.parent_comment_id, c.content, c.created_at, \
                    u.username, u.full_name, u.profile_picture, u.is_verified, \
                    (SELECT COUNT(*) FROM likes WHERE comment_id = c.id) AS likes_count, \
                    EXISTS(SELECT 1 FROM likes WHERE comment_id = c.id AND user_id = ?) AS is_liked \
             FROM comments c \
             JOIN users u ON u.id = c.user_id \
             JOIN posts p ON p.id = c.post_id \
             WHERE p.id = ? OR p.uuid = ? \
             ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(viewer)
        .bind(reference)
        .bind(reference)
        .fetch_all(self.pool())
        .await
        .context("Failed to query comments")?;

        Ok(rows
            .iter()
            .map(|row| CommentView {
                id: row.get("id"),
                uuid: row.get("uuid"),
                post_id: row.get("post_id"),
                user_id: row.get("user_id"),
                parent_comment_id: row.get("parent_comment_id"),
                content: row.get("content"),
                created_at: row.get("created_at"),
                username: row.get("username"),
                full_name: row.get("full_name"),
                profile_picture: row.get("profile_picture"),
                is_verified: row.get::<i64, _>("is_verified") != 0,
                likes_count: row.get("likes_count"),
                is_liked: row.get::<i64, _>("is_liked") != 0,
            })
            .collect())
    }

    /// Owner-only delete. Returns false when the post is missing or owned
    /// by someone else; callers collapse both into 404.
    pub async fn delete_post(&self, user: i64, reference: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE (id = ? OR uuid = ?) AND user_id = ?")
            .bind(reference)
            .bind(reference)
            .bind(user)
            .execute(self.pool())
            .await
            .context("Failed to delete post")?;
        Ok(result.rows_affected() > 0)
    }

    /// Live hashtag usage counter, mainly for diagnostics and tests.
    pub async fn hashtag_posts_count(&self, name: &str) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT posts_count FROM hashtags WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool())
            .await
            .context("Failed to query hashtag")?;
        Ok(row.map(|row| row.get("posts_count")))
    }
}

/// Upserts the hashtag counter and links it to the post.
async fn link_hashtag(tx: &mut Transaction<'_, Sqlite>, post_id: i64, tag: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO hashtags (name, posts_count) VALUES (?, 1) \
         ON CONFLICT(name) DO UPDATE SET posts_count = posts_count + 1",
    )
    .bind(tag)
    .execute(&mut **tx)
    .await
    .context("Failed to upsert hashtag")?;

    let hashtag_id: i64 = sqlx::query("SELECT id FROM hashtags WHERE name = ?")
        .bind(tag)
        .fetch_one(&mut **tx)
        .await
        .context("Failed to query hashtag id")?
        .get("id");

    sqlx::query("INSERT OR IGNORE INTO post_hashtags (post_id, hashtag_id) VALUES (?, ?)")
        .bind(post_id)
        .bind(hashtag_id)
        .execute(&mut **tx)
        .await
        .context("Failed to link hashtag")?;
    Ok(())
}
