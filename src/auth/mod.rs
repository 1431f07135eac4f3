use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;

pub mod session;

use session::{Session, SessionStore};

pub const SESSION_COOKIE: &str = "session";

/// Resolves session tokens to users. Login and registration live in the
/// account service; this crate only reads what it issued.
pub struct AuthService {
    session_store: SessionStore,
}

impl AuthService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            session_store: SessionStore::new(pool),
        }
    }

    /// Issues a session for `user_id`. Used by fixtures and operational
    /// tooling; returns the raw token, which is never stored.
    pub async fn create_session(&self, user_id: Uuid, duration_hours: i64) -> Result<(Session, String)> {
        let token = generate_token();
        let expires_at = Utc::now() + Duration::hours(duration_hours);

        let session = self.session_store.create(user_id, &token, expires_at).await?;

        Ok((session, token))
    }

    pub async fn validate_session(&self, token: &str) -> Result<Option<Session>> {
        self.session_store.find_by_token(token).await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.session_store.cleanup_expired().await
    }
}

fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn service_with_user() -> (AuthService, Uuid) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let user_id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, username, email, full_name) VALUES (?, 'ana', 'ana@example.com', 'Ana')")
            .bind(user_id.to_string())
            .execute(&pool)
            .await
            .unwrap();
        (AuthService::new(pool), user_id)
    }

    #[tokio::test]
    async fn issued_token_resolves_to_its_user() {
        let (auth, user_id) = service_with_user().await;

        let (session, token) = auth.create_session(user_id, 1).await.unwrap();
        let found = auth.validate_session(&token).await.unwrap().unwrap();

        assert_eq!(found.id, session.id);
        assert_eq!(found.user_id, user_id);
        assert!(auth.validate_session("forged").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected_and_cleaned_up() {
        let (auth, user_id) = service_with_user().await;

        let (_, token) = auth.create_session(user_id, -1).await.unwrap();

        assert!(auth.validate_session(&token).await.unwrap().is_none());
        assert_eq!(auth.cleanup_expired_sessions().await.unwrap(), 1);
    }
}
