//! Notification storage.
//!
//! Notifications are write-side-effects of actions in other components and
//! are always inserted inside the transaction of the action that triggers
//! them. Self-triggered actions never notify; that suppression happens at
//! the call sites, which know the actor.

use anyhow::{Context, Result};
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use super::{now, Database};
use crate::models::{NotificationKind, NotificationView, UserSummary};

/// Inserts one notification row as part of an ongoing transaction.
pub(crate) async fn insert_notification(
    tx: &mut Transaction<'_, Sqlite>,
    recipient: i64,
    kind: &str,
    reference_id: Option<i64>,
    from_user: Option<i64>,
    content: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO notifications (uuid, user_id, type, reference_id, from_user_id, content, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(recipient)
    .bind(kind)
    .bind(reference_id)
    .bind(from_user)
    .bind(content)
    .bind(now())
    .execute(&mut **tx)
    .await
    .context("Failed to insert notification")?;
    Ok(())
}

impl Database {
    /// Newest-first page of notifications with the triggering actor's
    /// profile, plus the live unread count. Fetches one row beyond the
    /// page to compute a precise `has_more`.
    pub async fn list_notifications(
        &self,
        user: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<NotificationView>, i64, bool)> {
        let rows = sqlx::query(
            "SELECT n.id, n.uuid, n.type, n.reference_id, n.content, n.is_read, n.created_at, \
                    u.id AS actor_id, u.uuid AS actor_uuid, u.username, u.full_name, \
                    u.profile_picture, u.is_verified \
             FROM notifications n \
             LEFT JOIN users u ON u.id = n.from_user_id \
             WHERE n.user_id = ? \
             ORDER BY n.created_at DESC, n.id DESC \
             LIMIT ? OFFSET ?",
        )
        .bind(user)
        .bind(limit + 1)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .context("Failed to list notifications")?;

        let has_more = rows.len() as i64 > limit;
        let notifications = rows
            .iter()
            .take(limit as usize)
            .map(|row| {
                let kind = NotificationKind::from_row(
                    row.get::<String, _>("type").as_str(),
                    row.get("reference_id"),
                    row.get("content"),
                );
                let actor = row
                    .get::<Option<i64>, _>("actor_id")
                    .map(|actor_id| UserSummary {
                        id: actor_id,
                        uuid: row.get("actor_uuid"),
                        username: row.get("username"),
                        full_name: row.get("full_name"),
                        profile_picture: row.get("profile_picture"),
                        is_verified: row.get::<Option<i64>, _>("is_verified").unwrap_or(0) != 0,
                    });
                NotificationView {
                    id: row.get("id"),
                    uuid: row.get("uuid"),
                    kind,
                    actor,
                    is_read: row.get::<i64, _>("is_read") != 0,
                    created_at: row.get("created_at"),
                }
            })
            .collect();

        let unread = sqlx::query(
            "SELECT COUNT(*) AS count FROM notifications WHERE user_id = ? AND is_read = 0",
        )
        .bind(user)
        .fetch_one(self.pool())
        .await
        .context("Failed to count unread notifications")?
        .get::<i64, _>("count");

        Ok((notifications, unread, has_more))
    }

    /// Marks one notification read. Silent no-op when the row is missing,
    /// already read, or belongs to someone else.
    pub async fn mark_notification_read(&self, user: i64, reference: &str) -> Result<()> {
        sqlx::query(
            "UPDATE notifications SET is_read = 1 WHERE (id = ? OR uuid = ?) AND user_id = ?",
        )
        .bind(reference)
        .bind(reference)
        .bind(user)
        .execute(self.pool())
        .await
        .context("Failed to mark notification read")?;
        Ok(())
    }

    pub async fn mark_all_notifications_read(&self, user: i64) -> Result<()> {
        sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
            .bind(user)
            .execute(self.pool())
            .await
            .context("Failed to mark notifications read")?;
        Ok(())
    }

    /// Deletes the caller's own notification row. Silent no-op otherwise.
    pub async fn delete_notification(&self, user: i64, reference: &str) -> Result<()> {
        sqlx::query("DELETE FROM notifications WHERE (id = ? OR uuid = ?) AND user_id = ?")
            .bind(reference)
            .bind(reference)
            .bind(user)
            .execute(self.pool())
            .await
            .context("Failed to delete notification")?;
        Ok(())
    }
}
