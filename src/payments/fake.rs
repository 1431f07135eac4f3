use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::{
    error::{AppError, Result},
    payments::{CheckoutGateway, CheckoutRequest, CheckoutSession, CheckoutStatus},
};

/// In-memory gateway for tests. References are `fake-ref-<n>`; remote
/// status is whatever the test last set with [`FakeGateway::set_status`].
#[derive(Default)]
pub struct FakeGateway {
    counter: AtomicUsize,
    fail_next: AtomicBool,
    statuses: Mutex<HashMap<String, CheckoutStatus>>,
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_checkout(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn set_status(&self, reference: &str, status: CheckoutStatus) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.insert(reference.to_string(), status);
        }
    }

    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CheckoutGateway for FakeGateway {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AppError::Gateway("fake gateway unavailable".to_string()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let reference = format!("fake-ref-{}", n);

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.set_status(&reference, CheckoutStatus::Pending);

        Ok(CheckoutSession {
            checkout_url: format!("https://checkout.test/{}", reference),
            reference: reference.clone(),
            raw: json!({ "reference_number": reference, "amount": request.amount.to_string() }),
        })
    }

    async fn retrieve_checkout(&self, reference: &str) -> Result<CheckoutStatus> {
        self.statuses
            .lock()
            .map_err(|_| AppError::Internal("fake gateway poisoned".to_string()))?
            .get(reference)
            .copied()
            .ok_or_else(|| AppError::Gateway(format!("unknown reference {}", reference)))
    }
}
