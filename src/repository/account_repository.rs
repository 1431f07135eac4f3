use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::Account,
    error::{AppError, Result},
    repository::{parse_opt_money, parse_uuid, to_utc, AccountRepository},
};

#[derive(FromRow)]
struct AccountRow {
    id: String,
    username: String,
    email: String,
    full_name: String,
    phone_number: Option<String>,
    is_tourist: i32,
    is_local_guide: i32,
    guide_approved: i32,
    is_agency: i32,
    is_admin: i32,
    price_per_day: Option<String>,
    solo_price_per_day: Option<String>,
    multiple_additional_fee_per_head: Option<String>,
    booking_count: i64,
    confirmed_booking_count: i64,
    subscription_expires_at: Option<NaiveDateTime>,
}

/// Which running counter a booking transition bumps.
#[derive(Debug, Clone, Copy)]
pub enum BookingCounter {
    Accepted,
    Confirmed,
}

pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_account(row: AccountRow) -> Result<Account> {
        Ok(Account {
            id: parse_uuid(&row.id)?,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            phone_number: row.phone_number,
            is_tourist: row.is_tourist != 0,
            is_local_guide: row.is_local_guide != 0,
            guide_approved: row.guide_approved != 0,
            is_agency: row.is_agency != 0,
            is_admin: row.is_admin != 0,
            price_per_day: parse_opt_money(row.price_per_day)?,
            solo_price_per_day: parse_opt_money(row.solo_price_per_day)?,
            multiple_additional_fee_per_head: parse_opt_money(row.multiple_additional_fee_per_head)?,
            booking_count: row.booking_count,
            confirmed_booking_count: row.confirmed_booking_count,
            subscription_expires_at: row.subscription_expires_at.map(to_utc),
        })
    }

    pub async fn increment_counter(
        conn: &mut SqliteConnection,
        account_id: Uuid,
        counter: BookingCounter,
    ) -> Result<()> {
        let sql = match counter {
            BookingCounter::Accepted => {
                "UPDATE users SET booking_count = booking_count + 1 WHERE id = ?"
            }
            BookingCounter::Confirmed => {
                "UPDATE users SET confirmed_booking_count = confirmed_booking_count + 1 WHERE id = ?"
            }
        };
        sqlx::query(sql)
            .bind(account_id.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Pushes the paid tier one year past whichever is later: now or the
    /// current expiry.
    pub async fn extend_subscription(
        conn: &mut SqliteConnection,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let current: Option<(Option<NaiveDateTime>,)> =
            sqlx::query_as("SELECT subscription_expires_at FROM users WHERE id = ?")
                .bind(account_id.to_string())
                .fetch_optional(&mut *conn)
                .await?;

        let current = current
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?
            .0
            .map(to_utc);

        let base = match current {
            Some(expiry) if expiry > now => expiry,
            _ => now,
        };
        let new_expiry = base + Duration::days(365);

        sqlx::query("UPDATE users SET subscription_expires_at = ? WHERE id = ?")
            .bind(new_expiry.naive_utc())
            .bind(account_id.to_string())
            .execute(&mut *conn)
            .await?;

        Ok(new_expiry)
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, username, email, full_name, phone_number,
                   is_tourist, is_local_guide, guide_approved, is_agency, is_admin,
                   price_per_day, solo_price_per_day, multiple_additional_fee_per_head,
                   booking_count, confirmed_booking_count, subscription_expires_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_account).transpose()
    }
}
