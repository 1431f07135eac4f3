mod common;

use chrono::{Duration, Utc};
use common::{date_in, TestApp};
use localynk::domain::BookingStatus;
use uuid::Uuid;

async fn backdate(app: &TestApp, booking_id: Uuid, minutes: i64) {
    sqlx::query("UPDATE bookings SET created_at = ? WHERE id = ?")
        .bind((Utc::now() - Duration::minutes(minutes)).naive_utc())
        .bind(booking_id.to_string())
        .execute(&app.pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn purges_only_stale_unpaid_bookings() {
    let app = TestApp::new().await;
    let tourist = app.tourist("ana").await;
    let guide = app.guide("ben").await;
    let dest = app.destination("Siargao").await;

    let stale = app.book_guide(&tourist, &guide, dest, date_in(10), 1, 1).await;
    let fresh = app.book_guide(&tourist, &guide, dest, date_in(12), 1, 1).await;
    let accepted = app.book_guide(&tourist, &guide, dest, date_in(14), 1, 1).await;
    app.ctx
        .booking_service
        .transition(&guide, accepted.id, BookingStatus::Accepted)
        .await
        .unwrap();

    backdate(&app, stale.id, 45).await;
    backdate(&app, fresh.id, 10).await;
    backdate(&app, accepted.id, 120).await;

    let purged = app
        .ctx
        .sweep_service
        .purge_stale_pending(Duration::minutes(30))
        .await
        .unwrap();

    assert_eq!(purged, 1);
    assert!(app.ctx.booking_repo.find_by_id(stale.id).await.unwrap().is_none());
    assert!(app.ctx.booking_repo.find_by_id(fresh.id).await.unwrap().is_some());
    assert!(app.ctx.booking_repo.find_by_id(accepted.id).await.unwrap().is_some());
}

#[tokio::test]
async fn payment_record_outlives_its_swept_booking() {
    let app = TestApp::new().await;
    let tourist = app.tourist("ana").await;
    let guide = app.guide("ben").await;
    let dest = app.destination("Siargao").await;
    let booking = app.book_guide(&tourist, &guide, dest, date_in(10), 1, 1).await;
    let initiated = app.pay_for(&tourist, &booking).await;

    backdate(&app, booking.id, 60).await;
    app.ctx
        .sweep_service
        .purge_stale_pending(Duration::minutes(30))
        .await
        .unwrap();

    let payment = app
        .ctx
        .payment_repo
        .find_by_id(initiated.payment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.related_booking_id, None);
    assert_eq!(payment.gateway_transaction_id, initiated.transaction_id);
}

#[tokio::test]
async fn sweeping_twice_is_harmless() {
    let app = TestApp::new().await;

    let sweeper = &app.ctx.sweep_service;
    assert_eq!(sweeper.purge_stale_pending(Duration::minutes(30)).await.unwrap(), 0);
    assert_eq!(sweeper.purge_stale_pending(Duration::minutes(30)).await.unwrap(), 0);
}
