use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::Result,
    notifications::{Alert, NotificationSink},
};

/// Keeps every alert in memory so tests can assert on what was sent.
#[derive(Default)]
pub struct RecordingSink {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn alerts_for(&self, recipient_id: Uuid) -> Vec<Alert> {
        self.alerts()
            .into_iter()
            .filter(|a| a.recipient_id == recipient_id)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_alert(&self, alert: &Alert) -> Result<()> {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push(alert.clone());
        }
        Ok(())
    }
}
