use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentStatus, PaymentType},
    error::{AppError, Result},
    repository::{parse_money, parse_opt_uuid, parse_uuid, to_utc, PaymentRepository},
};

const PAYMENT_COLUMNS: &str = r#"
    id, payer_id, payment_type, related_booking_id, amount, payment_method,
    gateway_transaction_id, checkout_url, status, gateway_response,
    timestamp, resolved_at
"#;

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    payer_id: String,
    payment_type: String,
    related_booking_id: Option<String>,
    amount: String,
    payment_method: String,
    gateway_transaction_id: String,
    checkout_url: Option<String>,
    status: String,
    gateway_response: Option<String>,
    timestamp: NaiveDateTime,
    resolved_at: Option<NaiveDateTime>,
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: parse_uuid(&row.id)?,
            payer_id: parse_uuid(&row.payer_id)?,
            payment_type: PaymentType::parse(&row.payment_type).ok_or_else(|| {
                AppError::Database(format!("Invalid payment type: {}", row.payment_type))
            })?,
            related_booking_id: parse_opt_uuid(row.related_booking_id)?,
            amount: parse_money(&row.amount)?,
            payment_method: row.payment_method,
            gateway_transaction_id: row.gateway_transaction_id,
            checkout_url: row.checkout_url,
            status: PaymentStatus::parse(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid payment status: {}", row.status)))?,
            gateway_response: row
                .gateway_response
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .map_err(|e| AppError::Database(e.to_string()))?,
            timestamp: to_utc(row.timestamp),
            resolved_at: row.resolved_at.map(to_utc),
        })
    }

    /// Resolves a still-pending payment on the given connection. Returns
    /// false if another caller resolved it first.
    pub async fn claim(
        conn: &mut SqliteConnection,
        id: Uuid,
        status: PaymentStatus,
        payload: &serde_json::Value,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?, gateway_response = ?, resolved_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(payload.to_string())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// True while a checkout for the booking is still open at the gateway.
    pub async fn has_pending_for_booking(conn: &mut SqliteConnection, booking_id: Uuid) -> Result<bool> {
        let open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM payments WHERE related_booking_id = ? AND status = 'pending'",
        )
        .bind(booking_id.to_string())
        .fetch_one(&mut *conn)
        .await?;
        Ok(open > 0)
    }

    pub async fn write_status(conn: &mut SqliteConnection, id: Uuid, status: PaymentStatus) -> Result<()> {
        sqlx::query("UPDATE payments SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, payer_id, payment_type, related_booking_id, amount, payment_method,
                gateway_transaction_id, checkout_url, status, gateway_response,
                timestamp, resolved_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(payment.payer_id.to_string())
        .bind(payment.payment_type.as_str())
        .bind(payment.related_booking_id.map(|id| id.to_string()))
        .bind(payment.amount.to_string())
        .bind(&payment.payment_method)
        .bind(&payment.gateway_transaction_id)
        .bind(&payment.checkout_url)
        .bind(payment.status.as_str())
        .bind(payment.gateway_response.as_ref().map(|v| v.to_string()))
        .bind(payment.timestamp.naive_utc())
        .bind(payment.resolved_at.map(|dt| dt.naive_utc()))
        .execute(&self.pool)
        .await?;

        self.find_by_id(payment.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = ?",
            PAYMENT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_gateway_reference(&self, reference: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE gateway_transaction_id = ?",
            PAYMENT_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn list_for_payer(&self, payer_id: Uuid) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE payer_id = ? ORDER BY timestamp DESC",
            PAYMENT_COLUMNS
        ))
        .bind(payer_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn mark_failed(&self, id: Uuid, payload: &serde_json::Value) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Self::claim(&mut conn, id, PaymentStatus::Failed, payload).await
    }
}
