//! Friendship state machine.
//!
//! Edges are directed rows (requester, addressee) with a status; reads
//! treat accepted edges as undirected. At most one active edge exists per
//! unordered pair, enforced by the existence check in the request path.
//! States: none -> pending -> accepted | declined, plus a blocked edge
//! reachable from any state (prior edges are deleted first).

use anyhow::{Context, Result};
use sqlx::Row;

use super::{now, Database};
use crate::models::{FriendRequestView, FriendView};

impl Database {
    /// Status of the edge between two users, in either direction.
    pub async fn friendship_between(&self, a: i64, b: i64) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT status FROM friendships \
             WHERE (requester_id = ? AND addressee_id = ?) \
                OR (requester_id = ? AND addressee_id = ?)",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_optional(self.pool())
        .await
        .context("Failed to query friendship")?;

        Ok(row.map(|row| row.get("status")))
    }

    /// Inserts a pending edge and the `friend_request` notification for the
    /// addressee in one transaction. Callers check for an existing edge
    /// first; two racing requests can still both pass that check, which is
    /// left as a known race (see DESIGN.md).
    pub async fn create_friend_request(&self, requester: i64, addressee: i64) -> Result<()> {
        let mut tx = self.pool().begin().await.context("Failed to begin tx")?;

        sqlx::query(
            "INSERT INTO friendships (requester_id, addressee_id, status, created_at) \
             VALUES (?, ?, 'pending', ?)",
        )
        .bind(requester)
        .bind(addressee)
        .bind(now())
        .execute(&mut *tx)
        .await
        .context("Failed to insert friendship edge")?;

        super::notifications::insert_notification(
            &mut tx,
            addressee,
            "friend_request",
            None,
            Some(requester),
            None,
        )
        .await?;

        tx.commit().await.context("Failed to commit friend request")
    }

    /// Transitions the pending edge requester->addressee to accepted and
    /// notifies the requester. Returns false when no such pending edge
    /// exists.
    pub async fn accept_friend_request(&self, addressee: i64, requester: i64) -> Result<bool> {
        let mut tx = self.pool().begin().await.context("Failed to begin tx")?;

        let result = sqlx::query(
            "UPDATE friendships SET status = 'accepted' \
             WHERE requester_id = ? AND addressee_id = ? AND status = 'pending'",
        )
        .bind(requester)
        .bind(addressee)
        .execute(&mut *tx)
        .await
        .context("Failed to accept friend request")?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        super::notifications::insert_notification(
            &mut tx,
            requester,
            "friend_accept",
            None,
            Some(addressee),
            None,
        )
        .await?;

        tx.commit().await.context("Failed to commit accept")?;
        Ok(true)
    }

    /// Transitions the pending edge requester->addressee to declined.
    /// Returns false when no such pending edge exists.
    pub async fn decline_friend_request(&self, addressee: i64, requester: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE friendships SET status = 'declined' \
             WHERE requester_id = ? AND addressee_id = ? AND status = 'pending'",
        )
        .bind(requester)
        .bind(addressee)
        .execute(self.pool())
        .await
        .context("Failed to decline friend request")?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes the accepted edge between two users, either direction.
    /// Idempotent: removing a non-existent friendship is not an error.
    pub async fn remove_friend(&self, user: i64, friend: i64) -> Result<()> {
        sqlx::query(
            "DELETE FROM friendships \
             WHERE ((requester_id = ? AND addressee_id = ?) \
                 OR (requester_id = ? AND addressee_id = ?)) \
               AND status = 'accepted'",
        )
        .bind(user)
        .bind(friend)
        .bind(friend)
        .bind(user)
        .execute(self.pool())
        .await
        .context("Failed to remove friend")?;
        Ok(())
    }

    /// Replaces any edge between the pair with a directed blocked edge.
    pub async fn block_user(&self, blocker: i64, blocked: i64) -> Result<()> {
        let mut tx = self.pool().begin().await.context("Failed to begin tx")?;

        sqlx::query(
            "DELETE FROM friendships \
             WHERE (requester_id = ? AND addressee_id = ?) \
                OR (requester_id = ? AND addressee_id = ?)",
        )
        .bind(blocker)
        .bind(blocked)
        .bind(blocked)
        .bind(blocker)
        .execute(&mut *tx)
        .await
        .context("Failed to clear friendship edges")?;

        sqlx::query(
            "INSERT INTO friendships (requester_id, addressee_id, status, created_at) \
             VALUES (?, ?, 'blocked', ?)",
        )
        .bind(blocker)
        .bind(blocked)
        .bind(now())
        .execute(&mut *tx)
        .await
        .context("Failed to insert blocked edge")?;

        tx.commit().await.context("Failed to commit block")
    }

    /// All peers connected via an accepted edge, direction-agnostic, with
    /// the edge creation time as "friends since".
    pub async fn list_friends(&self, user: i64) -> Result<Vec<FriendView>> {
        let rows = sqlx::query(
            "SELECT u.id, u.uuid, u.username, u.full_name, u.profile_picture, u.is_verified, \
                    f.created_at AS friends_since \
             FROM friendships f \
             JOIN users u ON u.id = CASE \
                 WHEN f.requester_id = ? THEN f.addressee_id \
                 ELSE f.requester_id \
             END \
             WHERE (f.requester_id = ? OR f.addressee_id = ?) AND f.status = 'accepted' \
             ORDER BY u.username",
        )
        .bind(user)
        .bind(user)
        .bind(user)
        .fetch_all(self.pool())
        .await
        .context("Failed to list friends")?;

        Ok(rows
            .iter()
            .map(|row| FriendView {
                id: row.get("id"),
                uuid: row.get("uuid"),
                username: row.get("username"),
                full_name: row.get("full_name"),
                profile_picture: row.get("profile_picture"),
                is_verified: row.get::<i64, _>("is_verified") != 0,
                friends_since: row.get("friends_since"),
            })
            .collect())
    }

    /// Pending requests addressed to `user`, newest first.
    pub async fn list_friend_requests(&self, user: i64) -> Result<Vec<FriendRequestView>> {
        let rows = sqlx::query(
            "SELECT u.id, u.uuid, u.username, u.full_name, u.profile_picture, u.is_verified, \
                    f.created_at AS requested_at \
             FROM friendships f \
             JOIN users u ON u.id = f.requester_id \
             WHERE f.addressee_id = ? AND f.status = 'pending' \
             ORDER BY f.created_at DESC, f.id DESC",
        )
        .bind(user)
        .fetch_all(self.pool())
        .await
        .context("Failed to list friend requests")?;

        Ok(rows
            .iter()
            .map(|row| FriendRequestView {
                id: row.get("id"),
                uuid: row.get("uuid"),
                username: row.get("username"),
                full_name: row.get("full_name"),
                profile_picture: row.get("profile_picture"),
                is_verified: row.get::<i64, _>("is_verified") != 0,
                requested_at: row.get("requested_at"),
            })
            .collect())
    }

    /// Resolves a user id by numeric id, confirming existence.
    pub async fn user_exists(&self, user_id: i64) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
            .context("Failed to check user existence")?;
        Ok(row.is_some())
    }
}
