pub mod availability;
pub mod booking_service;
pub mod payment_service;
pub mod reconciliation;
pub mod state_machine;
pub mod sweep;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::AuthService;
use crate::config::Settings;
use crate::notifications::NotificationManager;
use crate::payments::CheckoutGateway;
use crate::repository::*;

pub use availability::AvailabilityChecker;
pub use booking_service::BookingService;
pub use payment_service::PaymentService;
pub use reconciliation::{PaymentReconciler, ReconcileOutcome};
pub use state_machine::{BookingStateMachine, TransitionOutcome};
pub use sweep::SweepService;

pub struct ServiceContext {
    pub booking_repo: Arc<dyn BookingRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub account_repo: Arc<dyn AccountRepository>,
    pub catalog_repo: Arc<dyn CatalogRepository>,
    pub notifications: Arc<NotificationManager>,
    pub auth_service: Arc<AuthService>,
    pub availability: Arc<AvailabilityChecker>,
    pub state_machine: Arc<BookingStateMachine>,
    pub booking_service: Arc<BookingService>,
    pub reconciler: Arc<PaymentReconciler>,
    pub payment_service: Arc<PaymentService>,
    pub sweep_service: Arc<SweepService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        gateway: Option<Arc<dyn CheckoutGateway>>,
        notifications: Arc<NotificationManager>,
        settings: &Settings,
    ) -> Self {
        let booking_repo: Arc<dyn BookingRepository> =
            Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> =
            Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let account_repo: Arc<dyn AccountRepository> =
            Arc::new(SqliteAccountRepository::new(db_pool.clone()));
        let catalog_repo: Arc<dyn CatalogRepository> =
            Arc::new(SqliteCatalogRepository::new(db_pool.clone()));

        let auth_service = Arc::new(AuthService::new(db_pool.clone()));

        let availability = Arc::new(AvailabilityChecker::new(
            db_pool.clone(),
            booking_repo.clone(),
        ));
        let state_machine = Arc::new(BookingStateMachine::new(
            db_pool.clone(),
            catalog_repo.clone(),
            notifications.clone(),
        ));
        let booking_service = Arc::new(BookingService::new(
            booking_repo.clone(),
            account_repo.clone(),
            catalog_repo.clone(),
            availability.clone(),
            state_machine.clone(),
            settings.booking.agency_daily_rate,
        ));
        let reconciler = Arc::new(PaymentReconciler::new(
            db_pool.clone(),
            payment_repo.clone(),
            booking_repo.clone(),
            state_machine.clone(),
            notifications.clone(),
        ));
        let payment_service = Arc::new(PaymentService::new(
            payment_repo.clone(),
            booking_repo.clone(),
            gateway,
            reconciler.clone(),
            settings.subscription.yearly_price,
        ));
        let sweep_service = Arc::new(SweepService::new(booking_repo.clone()));

        Self {
            booking_repo,
            payment_repo,
            account_repo,
            catalog_repo,
            notifications,
            auth_service,
            availability,
            state_machine,
            booking_service,
            reconciler,
            payment_service,
            sweep_service,
            db_pool,
        }
    }
}
