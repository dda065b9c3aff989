//! Direct messages and the conversation list.

use anyhow::{Context, Result};
use sqlx::Row;
use uuid::Uuid;

use super::{now, Database};
use crate::models::{ConversationView, MessageView};

fn map_message_row(row: &sqlx::sqlite::SqliteRow) -> MessageView {
    MessageView {
        id: row.get("id"),
        uuid: row.get("uuid"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        content: row.get("content"),
        is_read: row.get::<i64, _>("is_read") != 0,
        created_at: row.get("created_at"),
        username: row.get("username"),
        full_name: row.get("full_name"),
        profile_picture: row.get("profile_picture"),
    }
}

impl Database {
    /// Stores a message and notifies the receiver with a short preview in
    /// one transaction. Returns the stored message with sender info.
    pub async fn create_message(
        &self,
        sender: i64,
        receiver: i64,
        content: &str,
    ) -> Result<MessageView> {
        let uuid = Uuid::new_v4().to_string();
        let mut tx = self.pool().begin().await.context("Failed to begin tx")?;

        let result = sqlx::query(
            "INSERT INTO messages (uuid, sender_id, receiver_id, content, is_read, created_at) \
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(&uuid)
        .bind(sender)
        .bind(receiver)
        .bind(content)
        .bind(now())
        .execute(&mut *tx)
        .await
        .context("Failed to insert message")?;

        let preview: String = content.chars().take(50).collect();
        super::notifications::insert_notification(
            &mut tx,
            receiver,
            "message",
            None,
            Some(sender),
            Some(&preview),
        )
        .await?;

        tx.commit().await.context("Failed to commit message")?;

        let row = sqlx::query(
            "SELECT m.id, m.uuid, m.sender_id, m.receiver_id, m.content, m.is_read, m.created_at, \
                    u.username, u.full_name, u.profile_picture \
             FROM messages m \
             JOIN users u ON u.id = m.sender_id \
             WHERE m.id = ?",
        )
        .bind(result.last_insert_rowid())
        .fetch_one(self.pool())
        .await
        .context("Failed to load message")?;

        Ok(map_message_row(&row))
    }

    /// One entry per peer the user has exchanged messages with, carrying
    /// the latest message and the count of unread messages from that peer.
    /// Ordered newest conversation first.
    pub async fn conversations(&self, user: i64) -> Result<Vec<ConversationView>> {
        let rows = sqlx::query(
            "SELECT u.id, u.uuid, u.username, u.full_name, u.profile_picture, u.is_verified, \
                    m.content AS last_message, m.created_at AS last_message_time, \
                    m.sender_id AS last_sender_id, \
                    (SELECT COUNT(*) FROM messages \
                     WHERE sender_id = u.id AND receiver_id = ? AND is_read = 0) AS unread_count \
             FROM messages m \
             JOIN users u ON u.id = CASE WHEN m.sender_id = ? THEN m.receiver_id ELSE m.sender_id END \
             WHERE m.id = ( \
                 SELECT MAX(m2.id) FROM messages m2 \
                 WHERE (m2.sender_id = ? AND m2.receiver_id = u.id) \
                    OR (m2.sender_id = u.id AND m2.receiver_id = ?)) \
               AND (m.sender_id = ? OR m.receiver_id = ?) \
             ORDER BY m.id DESC",
        )
        .bind(user)
        .bind(user)
        .bind(user)
        .bind(user)
        .bind(user)
        .bind(user)
        .fetch_all(self.pool())
        .await
        .context("Failed to query conversations")?;

        Ok(rows
            .iter()
            .map(|row| ConversationView {
                id: row.get("id"),
                uuid: row.get("uuid"),
                username: row.get("username"),
                full_name: row.get("full_name"),
                profile_picture: row.get("profile_picture"),
                is_verified: row.get::<i64, _>("is_verified") != 0,
                last_message: row.get("last_message"),
                last_message_time: row.get("last_message_time"),
                is_own_message: row.get::<i64, _>("last_sender_id") == user,
                unread_count: row.get("unread_count"),
            })
            .collect())
    }

    /// A page of the two-party thread in chronological order, fetched
    /// newest-first then reversed. Reading the thread marks the peer's
    /// messages to the caller as read.
    pub async fn thread(
        &self,
        user: i64,
        peer: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MessageView>, bool)> {
        let rows = sqlx::query(
            "SELECT m.id, m.uuid, m.sender_id, m.receiver_id, m.content, m.is_read, m.created_at, \
                    u.username, u.full_name, u.profile_picture \
             FROM messages m \
             JOIN users u ON u.id = m.sender_id \
             WHERE (m.sender_id = ? AND m.receiver_id = ?) \
                OR (m.sender_id = ? AND m.receiver_id = ?) \
             ORDER BY m.id DESC \
             LIMIT ? OFFSET ?",
        )
        .bind(user)
        .bind(peer)
        .bind(peer)
        .bind(user)
        .bind(limit + 1)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .context("Failed to query thread")?;

        let has_more = rows.len() as i64 > limit;
        let mut messages: Vec<MessageView> = rows
            .iter()
            .take(limit as usize)
            .map(map_message_row)
            .collect();
        messages.reverse();

        sqlx::query("UPDATE messages SET is_read = 1 WHERE sender_id = ? AND receiver_id = ?")
            .bind(peer)
            .bind(user)
            .execute(self.pool())
            .await
            .context("Failed to mark thread read")?;

        Ok((messages, has_more))
    }

    /// Sender-only delete by id or uuid. Returns false when the message is
    /// missing or was sent by someone else.
    pub async fn delete_message(&self, sender: i64, reference: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM messages WHERE (id = ? OR uuid = ?) AND sender_id = ?")
                .bind(reference)
                .bind(reference)
                .bind(sender)
                .execute(self.pool())
                .await
                .context("Failed to delete message")?;
        Ok(result.rows_affected() > 0)
    }
}
