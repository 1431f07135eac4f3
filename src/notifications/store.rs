use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    error::Result,
    notifications::{Alert, NotificationSink},
};

/// Persists alerts to `system_alerts`, where the web client's inbox reads them.
pub struct AlertStoreSink {
    pool: SqlitePool,
}

impl AlertStoreSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn count_for(&self, recipient_id: Uuid) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM system_alerts WHERE recipient_id = ?")
                .bind(recipient_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }
}

#[async_trait]
impl NotificationSink for AlertStoreSink {
    fn name(&self) -> &str {
        "alert-store"
    }

    async fn send_alert(&self, alert: &Alert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO system_alerts (
                id, recipient_id, title, message,
                related_model, related_object_id, is_read, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(alert.recipient_id.to_string())
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(alert.related.map(|r| r.model()))
        .bind(alert.related.map(|r| r.id().to_string()))
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
