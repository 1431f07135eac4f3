use async_trait::async_trait;

use crate::{
    error::Result,
    notifications::{Alert, NotificationSink},
};

/// Writes every alert to the application log.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_alert(&self, alert: &Alert) -> Result<()> {
        tracing::info!(
            recipient_id = %alert.recipient_id,
            related = ?alert.related,
            "{}: {}",
            alert.title,
            alert.message
        );
        Ok(())
    }
}
