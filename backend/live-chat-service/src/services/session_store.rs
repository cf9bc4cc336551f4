use actix_middleware::{SessionAuthError, SessionResolver};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::contact::parse_timestamp;

/// Resolves the social network's session cookie against the `sessions` table.
/// Expired sessions are deleted on sight.
#[derive(Clone)]
pub struct SqliteSessionResolver {
    pool: SqlitePool,
}

impl SqliteSessionResolver {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionResolver for SqliteSessionResolver {
    async fn resolve(&self, session_id: &str) -> Result<Option<String>, SessionAuthError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE id = ?")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| SessionAuthError::Lookup(e.to_string()))?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        let expired = parse_timestamp(&expires_at)
            .map(|at| at <= Utc::now())
            .unwrap_or(true);

        if expired {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(session_id)
                .execute(&self.pool)
                .await
                .map_err(|e| SessionAuthError::Lookup(e.to_string()))?;
            tracing::debug!(user_id = %user_id, "deleted expired session");
            return Ok(None);
        }

        Ok(Some(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MIGRATOR;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        MIGRATOR.run(&pool).await.unwrap();
        pool
    }

    async fn insert_session(pool: &SqlitePool, id: &str, user: &str, expires_in: Duration) {
        let expires_at = (Utc::now() + expires_in)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(user)
            .bind(expires_at)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn live_session_resolves_to_user() {
        let pool = pool().await;
        insert_session(&pool, "s1", "u1", Duration::hours(1)).await;

        let resolver = SqliteSessionResolver::new(pool);
        assert_eq!(resolver.resolve("s1").await.unwrap().as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn unknown_session_resolves_to_none() {
        let resolver = SqliteSessionResolver::new(pool().await);
        assert!(resolver.resolve("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_session_is_deleted() {
        let pool = pool().await;
        insert_session(&pool, "old", "u1", Duration::hours(-1)).await;

        let resolver = SqliteSessionResolver::new(pool.clone());
        assert!(resolver.resolve("old").await.unwrap().is_none());

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
