//! Persistence gateway for chat messages and contact history.
//!
//! The `messages`, `users` and `sessions` tables are shared with the rest of
//! the social network; this service only appends messages and reads the rest.

use crate::models::{contact::parse_timestamp, ConversationEntry, RecentContact};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

/// `created_at` layout. Sorts lexicographically in time order.
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(
        &self,
        id: Uuid,
        from: &str,
        to: &str,
        content: &str,
    ) -> Result<(), sqlx::Error>;

    /// Every message between `a` and `b` in either direction, oldest first.
    async fn query_conversation(&self, a: &str, b: &str)
        -> Result<Vec<ConversationEntry>, sqlx::Error>;

    /// Users who exchanged at least one message with `user_id`, with the time
    /// of the latest one. Never includes `user_id` itself.
    async fn query_recent_contacts(&self, user_id: &str)
        -> Result<Vec<RecentContact>, sqlx::Error>;

    async fn user_exists(&self, user_id: &str) -> Result<bool, sqlx::Error>;
}

#[derive(Clone)]
pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn insert_message(
        &self,
        id: Uuid,
        from: &str,
        to: &str,
        content: &str,
    ) -> Result<(), sqlx::Error> {
        let created_at = Utc::now().format(CREATED_AT_FORMAT).to_string();

        sqlx::query(
            r#"
            INSERT INTO messages (id, sender_id, receiver_id, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(from)
        .bind(to)
        .bind(content)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query_conversation(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Vec<ConversationEntry>, sqlx::Error> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT sender_id, receiver_id, content, created_at
            FROM messages
            WHERE (sender_id = ?1 AND receiver_id = ?2)
               OR (sender_id = ?2 AND receiver_id = ?1)
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(from, to, content, timestamp)| ConversationEntry {
                from,
                to,
                content,
                timestamp,
            })
            .collect())
    }

    async fn query_recent_contacts(
        &self,
        user_id: &str,
    ) -> Result<Vec<RecentContact>, sqlx::Error> {
        let rows: Vec<(String, String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT u.id, u.fname, u.lname, MAX(m.created_at) AS last_message_at
            FROM users u
            JOIN messages m ON (u.id = m.sender_id OR u.id = m.receiver_id)
            WHERE (m.sender_id = ?1 OR m.receiver_id = ?1)
              AND u.id != ?1
            GROUP BY u.id, u.fname, u.lname
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, first_name, last_name, last)| {
                let last_message_at = last.as_deref().and_then(parse_timestamp);
                if last.is_some() && last_message_at.is_none() {
                    tracing::warn!(contact_id = %id, raw = ?last, "unparseable message timestamp");
                }
                RecentContact {
                    id,
                    first_name,
                    last_name,
                    last_message_at,
                }
            })
            .collect())
    }

    async fn user_exists(&self, user_id: &str) -> Result<bool, sqlx::Error> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = ? LIMIT 1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}
