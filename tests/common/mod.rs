#![allow(dead_code)]

use std::sync::Arc;

use axum::{body::Body, http::Response, Router};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;

use localynk::{
    api,
    config::Settings,
    domain::{Account, Booking, CreateBookingRequest, InitiatePaymentRequest, InitiatedPayment},
    notifications::{NotificationManager, RecordingSink},
    payments::{CheckoutGateway, CheckoutStatus, CheckoutUpdate, FakeGateway},
    service::ServiceContext,
};

pub struct TestApp {
    pub pool: SqlitePool,
    pub ctx: Arc<ServiceContext>,
    pub gateway: Arc<FakeGateway>,
    pub alerts: Arc<RecordingSink>,
    pub settings: Arc<Settings>,
}

/// One connection so the in-memory database is shared by every query.
pub async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(Settings::default()).await
    }

    pub async fn with_settings(settings: Settings) -> Self {
        let pool = setup_pool().await;
        let gateway = Arc::new(FakeGateway::new());
        let alerts = Arc::new(RecordingSink::new());

        let notifications = Arc::new(NotificationManager::new());
        notifications.register(alerts.clone()).await;

        let ctx = Arc::new(ServiceContext::new(
            pool.clone(),
            Some(gateway.clone() as Arc<dyn CheckoutGateway>),
            notifications,
            &settings,
        ));

        Self {
            pool,
            ctx,
            gateway,
            alerts,
            settings: Arc::new(settings),
        }
    }

    /// Same fixture with no gateway configured.
    pub async fn without_gateway() -> Self {
        let mut app = Self::new().await;
        let notifications = Arc::new(NotificationManager::new());
        notifications.register(app.alerts.clone()).await;
        app.ctx = Arc::new(ServiceContext::new(
            app.pool.clone(),
            None,
            notifications,
            &app.settings,
        ));
        app
    }

    pub fn router(&self) -> Router {
        api::create_app(self.ctx.clone(), self.settings.clone())
    }

    pub async fn account(&self, id: Uuid) -> Account {
        self.ctx
            .account_repo
            .find_by_id(id)
            .await
            .expect("account query")
            .expect("account exists")
    }

    async fn insert_user(&self, username: &str, flags: UserFlags<'_>) -> Account {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, full_name, is_tourist, is_local_guide, guide_approved,
                is_agency, is_admin, price_per_day, solo_price_per_day,
                multiple_additional_fee_per_head
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(username)
        .bind(format!("{}@example.com", username))
        .bind(username.to_uppercase())
        .bind(!flags.local_guide && !flags.agency)
        .bind(flags.local_guide)
        .bind(flags.approved)
        .bind(flags.agency)
        .bind(flags.admin)
        .bind(flags.rates.map(|r| r.0))
        .bind(flags.rates.and_then(|r| r.1))
        .bind(flags.rates.and_then(|r| r.2))
        .execute(&self.pool)
        .await
        .expect("insert user");
        self.account(id).await
    }

    pub async fn tourist(&self, username: &str) -> Account {
        self.insert_user(username, UserFlags::default()).await
    }

    /// Approved guide charging 500/day, 450 solo, 100 per extra head.
    pub async fn guide(&self, username: &str) -> Account {
        self.insert_user(
            username,
            UserFlags {
                local_guide: true,
                approved: true,
                rates: Some(("500.00", Some("450.00"), Some("100.00"))),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn unapproved_guide(&self, username: &str) -> Account {
        self.insert_user(
            username,
            UserFlags {
                local_guide: true,
                rates: Some(("500.00", None, None)),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn agency(&self, username: &str) -> Account {
        self.insert_user(
            username,
            UserFlags {
                agency: true,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn admin(&self, username: &str) -> Account {
        self.insert_user(
            username,
            UserFlags {
                admin: true,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn destination(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO destinations (id, name) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(name)
            .execute(&self.pool)
            .await
            .expect("insert destination");
        id
    }

    pub async fn accommodation(&self, host: &Account, price: &str, approved: bool) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO accommodations (id, host_id, title, price, is_approved) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(host.id.to_string())
        .bind("Seaside room")
        .bind(price)
        .bind(approved)
        .execute(&self.pool)
        .await
        .expect("insert accommodation");
        id
    }

    pub async fn tour_package(
        &self,
        guide: &Account,
        destination: Uuid,
        solo_price: Option<&str>,
        additional_fee_per_head: &str,
    ) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO tour_packages (
                id, guide_id, main_destination_id, name, price_per_day, solo_price,
                additional_fee_per_head
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(guide.id.to_string())
        .bind(destination.to_string())
        .bind("Island hopping")
        .bind("700.00")
        .bind(solo_price)
        .bind(additional_fee_per_head)
        .execute(&self.pool)
        .await
        .expect("insert tour package");
        id
    }

    pub async fn token_for(&self, account: &Account) -> String {
        let (_, token) = self
            .ctx
            .auth_service
            .create_session(account.id, 24)
            .await
            .expect("create session");
        token
    }

    pub async fn book_guide(
        &self,
        tourist: &Account,
        guide: &Account,
        destination: Uuid,
        check_in: NaiveDate,
        nights: u64,
        guests: u32,
    ) -> Booking {
        self.ctx
            .booking_service
            .create(tourist, guide_request(guide.id, destination, check_in, nights, guests))
            .await
            .expect("create booking")
    }

    pub async fn pay_for(&self, tourist: &Account, booking: &Booking) -> InitiatedPayment {
        self.ctx
            .payment_service
            .initiate(
                tourist,
                InitiatePaymentRequest {
                    booking_id: Some(booking.id),
                    ..Default::default()
                },
            )
            .await
            .expect("initiate payment")
    }

    /// Settles a checkout as paid, the way a verified callback would.
    pub async fn settle(&self, payment: &InitiatedPayment) {
        let update = CheckoutUpdate {
            reference: payment.transaction_id.clone(),
            status: CheckoutStatus::Paid,
            amount: None,
        };
        self.ctx
            .reconciler
            .reconcile(&update, &serde_json::json!({}))
            .await
            .expect("reconcile payment");
    }

    pub async fn booking(&self, id: Uuid) -> Booking {
        self.ctx
            .booking_repo
            .find_by_id(id)
            .await
            .expect("booking query")
            .expect("booking exists")
    }
}

#[derive(Default, Clone, Copy)]
struct UserFlags<'a> {
    local_guide: bool,
    approved: bool,
    agency: bool,
    admin: bool,
    rates: Option<(&'a str, Option<&'a str>, Option<&'a str>)>,
}

pub fn guide_request(
    guide: Uuid,
    destination: Uuid,
    check_in: NaiveDate,
    nights: u64,
    guests: u32,
) -> CreateBookingRequest {
    CreateBookingRequest {
        accommodation: None,
        guide: Some(guide),
        agency: None,
        destination: Some(destination),
        check_in,
        check_out: check_in + chrono::Days::new(nights),
        num_guests: guests,
        tour_package_id: None,
        tourist_valid_id_image: None,
        tourist_selfie_image: None,
    }
}

/// A date `days` from today.
pub fn date_in(days: u64) -> NaiveDate {
    Utc::now().date_naive() + chrono::Days::new(days)
}

pub fn d(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}

/// PayMongo-shaped webhook body for a payment-link update.
pub fn link_event(reference: &str, status: &str) -> Value {
    serde_json::json!({
        "data": {
            "attributes": {
                "type": "link.payment.paid",
                "data": {
                    "attributes": {
                        "reference_number": reference,
                        "status": status,
                    }
                }
            }
        }
    })
}

/// Like [`link_event`], with the captured amount in centavos.
pub fn link_event_with_amount(reference: &str, status: &str, centavos: i64) -> Value {
    let mut event = link_event(reference, status);
    event["data"]["attributes"]["data"]["attributes"]["amount"] = centavos.into();
    event
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
