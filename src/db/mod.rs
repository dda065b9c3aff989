//! Database layer for the Driftwood server using SQLite.
//!
//! All durable state lives here; the server process holds no authoritative
//! in-memory state between requests. Queries are parameterized `sqlx`
//! statements; multi-statement writes that must stay consistent (an action
//! plus its notification fan-out, a post plus its hashtags) run inside a
//! single transaction.
//!
//! Sub-modules group operations by component:
pub mod content;
pub mod messaging;
pub mod notifications;
pub mod social;
pub mod stories;

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool as Pool};
use uuid::Uuid;

use crate::models::{AccountView, ProfileView, UpdateProfileRequest, UserSummary};

/// Current unix time in seconds.
pub fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Database connection pool and operations.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool,
}

/// A user row as needed for credential checks.
#[derive(Debug)]
pub struct UserCredentials {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub is_verified: bool,
}

impl Database {
    /// Opens (and creates if necessary) the database at the given path and
    /// runs migrations. Pass `:memory:` for an ephemeral database.
    pub async fn new(db_path: &str) -> Result<Self> {
        let is_memory = db_path == ":memory:";
        let db_url = if is_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{db_path}?mode=rwc")
        };

        // Every pooled connection to `sqlite::memory:` would get its own
        // empty database, so in-memory pools are capped at one connection.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(if is_memory { 1 } else { 5 })
            .min_connections(1)
            .idle_timeout(std::time::Duration::from_secs(300))
            .max_lifetime(std::time::Duration::from_secs(1800))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    use sqlx::Executor;
                    conn.execute("PRAGMA busy_timeout = 5000").await?;
                    conn.execute("PRAGMA journal_mode = WAL").await?;
                    conn.execute("PRAGMA foreign_keys = ON").await?;
                    Ok(())
                })
            })
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub(crate) fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Create or update the schema.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                full_name TEXT NOT NULL,
                bio TEXT,
                profile_picture TEXT,
                cover_picture TEXT,
                location TEXT,
                website TEXT,
                is_verified INTEGER NOT NULL DEFAULT 0,
                is_private INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                last_login INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create users table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS friendships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                requester_id INTEGER NOT NULL,
                addressee_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at INTEGER NOT NULL,
                FOREIGN KEY (requester_id) REFERENCES users (id) ON DELETE CASCADE,
                FOREIGN KEY (addressee_id) REFERENCES users (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create friendships table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                user_id INTEGER NOT NULL,
                content TEXT,
                image_url TEXT,
                video_url TEXT,
                privacy TEXT NOT NULL DEFAULT 'public',
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create posts table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                post_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                parent_comment_id INTEGER,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (post_id) REFERENCES posts (id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create comments table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS likes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                post_id INTEGER,
                comment_id INTEGER,
                created_at INTEGER NOT NULL,
                UNIQUE (user_id, post_id),
                UNIQUE (user_id, comment_id),
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE,
                FOREIGN KEY (post_id) REFERENCES posts (id) ON DELETE CASCADE,
                FOREIGN KEY (comment_id) REFERENCES comments (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create likes table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS saved_posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                post_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (user_id, post_id),
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE,
                FOREIGN KEY (post_id) REFERENCES posts (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create saved_posts table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                sender_id INTEGER NOT NULL,
                receiver_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (sender_id) REFERENCES users (id) ON DELETE CASCADE,
                FOREIGN KEY (receiver_id) REFERENCES users (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create messages table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                user_id INTEGER NOT NULL,
                type TEXT NOT NULL,
                reference_id INTEGER,
                from_user_id INTEGER,
                content TEXT,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE,
                FOREIGN KEY (from_user_id) REFERENCES users (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create notifications table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                user_id INTEGER NOT NULL,
                media_url TEXT NOT NULL,
                media_type TEXT NOT NULL,
                caption TEXT,
                views_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create stories table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS story_views (
                story_id INTEGER NOT NULL,
                viewer_id INTEGER NOT NULL,
                viewed_at INTEGER NOT NULL,
                PRIMARY KEY (story_id, viewer_id),
                FOREIGN KEY (story_id) REFERENCES stories (id) ON DELETE CASCADE,
                FOREIGN KEY (viewer_id) REFERENCES users (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create story_views table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hashtags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                posts_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create hashtags table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS post_hashtags (
                post_id INTEGER NOT NULL,
                hashtag_id INTEGER NOT NULL,
                PRIMARY KEY (post_id, hashtag_id),
                FOREIGN KEY (post_id) REFERENCES posts (id) ON DELETE CASCADE,
                FOREIGN KEY (hashtag_id) REFERENCES hashtags (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create post_hashtags table")?;

        // Indexes for the hot read paths.
        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_friendships_requester ON friendships (requester_id)",
            "CREATE INDEX IF NOT EXISTS idx_friendships_addressee ON friendships (addressee_id)",
            "CREATE INDEX IF NOT EXISTS idx_posts_user ON posts (user_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments (post_id)",
            "CREATE INDEX IF NOT EXISTS idx_likes_post ON likes (post_id)",
            "CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages (sender_id, receiver_id)",
            "CREATE INDEX IF NOT EXISTS idx_messages_receiver ON messages (receiver_id, sender_id)",
            "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications (user_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_stories_user ON stories (user_id, expires_at)",
        ] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to create index")?;
        }

        Ok(())
    }

    // ── User operations ──

    pub async fn email_or_username_exists(&self, email: &str, username: &str) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM users WHERE email = ? OR username = ?")
            .bind(email)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to check for existing user")?;
        Ok(row.is_some())
    }

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        full_name: &str,
    ) -> Result<(i64, String)> {
        let uuid = Uuid::new_v4().to_string();
        let result = sqlx::query(
            "INSERT INTO users (uuid, username, email, password_hash, full_name, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(full_name)
        .bind(now())
        .execute(&self.pool)
        .await
        .context("Failed to insert user")?;

        Ok((result.last_insert_rowid(), uuid))
    }

    pub async fn get_user_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>> {
        let row = sqlx::query(
            "SELECT id, uuid, username, email, password_hash, full_name, profile_picture, is_verified \
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query user by email")?;

        Ok(row.map(|row| UserCredentials {
            id: row.get("id"),
            uuid: row.get("uuid"),
            username: row.get("username"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            full_name: row.get("full_name"),
            profile_picture: row.get("profile_picture"),
            is_verified: row.get::<i64, _>("is_verified") != 0,
        }))
    }

    pub async fn get_account(&self, user_id: i64) -> Result<Option<AccountView>> {
        let row = sqlx::query(
            "SELECT id, uuid, username, email, full_name, profile_picture, is_verified \
             FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query user account")?;

        Ok(row.map(|row| AccountView {
            id: row.get("id"),
            uuid: row.get("uuid"),
            username: row.get("username"),
            email: row.get("email"),
            full_name: row.get("full_name"),
            profile_picture: row.get("profile_picture"),
            is_verified: row.get::<i64, _>("is_verified") != 0,
        }))
    }

    pub async fn get_password_hash(&self, user_id: i64) -> Result<Option<String>> {
        let row = sqlx::query("SELECT password_hash FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query password hash")?;
        Ok(row.map(|row| row.get("password_hash")))
    }

    pub async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to update password hash")?;
        Ok(())
    }

    pub async fn touch_last_login(&self, user_id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(now())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to update last login")?;
        Ok(())
    }

    /// Public profile with live post and friend counts. The
    /// `is_own_profile` and `friendship_status` fields are filled by the
    /// caller, which knows the viewer.
    pub async fn get_profile(&self, username: &str) -> Result<Option<ProfileView>> {
        let row = sqlx::query(
            "SELECT u.id, u.uuid, u.username, u.full_name, u.bio, u.profile_picture, \
                    u.cover_picture, u.location, u.website, u.is_verified, u.is_private, u.created_at, \
                    (SELECT COUNT(*) FROM posts WHERE user_id = u.id) AS posts_count, \
                    (SELECT COUNT(*) FROM friendships \
                     WHERE (requester_id = u.id OR addressee_id = u.id) AND status = 'accepted') AS friends_count \
             FROM users u WHERE u.username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query user profile")?;

        Ok(row.map(|row| ProfileView {
            id: row.get("id"),
            uuid: row.get("uuid"),
            username: row.get("username"),
            full_name: row.get("full_name"),
            bio: row.get("bio"),
            profile_picture: row.get("profile_picture"),
            cover_picture: row.get("cover_picture"),
            location: row.get("location"),
            website: row.get("website"),
            is_verified: row.get::<i64, _>("is_verified") != 0,
            is_private: row.get::<i64, _>("is_private") != 0,
            created_at: row.get("created_at"),
            posts_count: row.get("posts_count"),
            friends_count: row.get("friends_count"),
            is_own_profile: false,
            friendship_status: None,
        }))
    }

    /// Partial profile update. Reads the current row, merges the patch and
    /// writes all fields back; absent fields keep their value, explicit
    /// nulls clear nullable fields.
    pub async fn update_profile(&self, user_id: i64, patch: &UpdateProfileRequest) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin tx")?;

        let row = sqlx::query(
            "SELECT full_name, bio, location, website, is_private FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to read profile for update")?;

        let full_name: String = match &patch.full_name {
            Some(value) => value.clone(),
            None => row.get("full_name"),
        };
        let bio: Option<String> = match &patch.bio {
            Some(value) => value.clone(),
            None => row.get("bio"),
        };
        let location: Option<String> = match &patch.location {
            Some(value) => value.clone(),
            None => row.get("location"),
        };
        let website: Option<String> = match &patch.website {
            Some(value) => value.clone(),
            None => row.get("website"),
        };
        let is_private: bool = match patch.is_private {
            Some(value) => value,
            None => row.get::<i64, _>("is_private") != 0,
        };

        sqlx::query(
            "UPDATE users SET full_name = ?, bio = ?, location = ?, website = ?, is_private = ? \
             WHERE id = ?",
        )
        .bind(&full_name)
        .bind(&bio)
        .bind(&location)
        .bind(&website)
        .bind(is_private)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to update profile")?;

        tx.commit().await.context("Failed to commit profile update")
    }

    pub async fn set_profile_picture(&self, user_id: i64, url_path: &str) -> Result<()> {
        sqlx::query("UPDATE users SET profile_picture = ? WHERE id = ?")
            .bind(url_path)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to update profile picture")?;
        Ok(())
    }

    pub async fn set_cover_picture(&self, user_id: i64, url_path: &str) -> Result<()> {
        sqlx::query("UPDATE users SET cover_picture = ? WHERE id = ?")
            .bind(url_path)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to update cover picture")?;
        Ok(())
    }

    pub async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<UserSummary>> {
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let rows = sqlx::query(
            "SELECT id, uuid, username, full_name, profile_picture, is_verified \
             FROM users \
             WHERE username LIKE ? ESCAPE '\\' OR full_name LIKE ? ESCAPE '\\' \
             ORDER BY username \
             LIMIT ?",
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to search users")?;

        Ok(rows.iter().map(map_user_summary).collect())
    }
}

/// Maps the standard user summary column set.
pub(crate) fn map_user_summary(row: &sqlx::sqlite::SqliteRow) -> UserSummary {
    UserSummary {
        id: row.get("id"),
        uuid: row.get("uuid"),
        username: row.get("username"),
        full_name: row.get("full_name"),
        profile_picture: row.get("profile_picture"),
        is_verified: row.get::<i64, _>("is_verified") != 0,
    }
}
