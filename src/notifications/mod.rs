use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

pub mod logging;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod recording;

pub use logging::LogSink;
pub use store::AlertStoreSink;
#[cfg(any(test, feature = "test-utils"))]
pub use recording::RecordingSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelatedEntity {
    Booking(Uuid),
    Payment(Uuid),
}

impl RelatedEntity {
    pub fn model(&self) -> &'static str {
        match self {
            RelatedEntity::Booking(_) => "Booking",
            RelatedEntity::Payment(_) => "Payment",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            RelatedEntity::Booking(id) | RelatedEntity::Payment(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub recipient_id: Uuid,
    pub title: String,
    pub message: String,
    pub related: Option<RelatedEntity>,
}

impl Alert {
    pub fn new(
        recipient_id: Uuid,
        title: impl Into<String>,
        message: impl Into<String>,
        related: RelatedEntity,
    ) -> Self {
        Self {
            recipient_id,
            title: title.into(),
            message: message.into(),
            related: Some(related),
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;
    async fn send_alert(&self, alert: &Alert) -> Result<()>;
}

/// Fans alerts out to every registered sink. Delivery is best effort: a
/// failing sink is logged and never fails the booking operation that
/// produced the alert.
pub struct NotificationManager {
    sinks: RwLock<Vec<Arc<dyn NotificationSink>>>,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, sink: Arc<dyn NotificationSink>) {
        tracing::info!("Registered notification sink: {}", sink.name());
        self.sinks.write().await.push(sink);
    }

    pub async fn dispatch(&self, alerts: Vec<Alert>) {
        if alerts.is_empty() {
            return;
        }
        let sinks = self.sinks.read().await;

        for alert in &alerts {
            for sink in sinks.iter() {
                if let Err(e) = sink.send_alert(alert).await {
                    tracing::error!(
                        sink = sink.name(),
                        recipient_id = %alert.recipient_id,
                        title = %alert.title,
                        "Notification sink failed to deliver alert: {:?}",
                        e
                    );
                }
            }
        }
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}
