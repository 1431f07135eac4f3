use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{AssignStaffRequest, Booking, BookingStatus, BookingTarget, Commission, PriceQuote, StayWindow},
    error::{AppError, Result},
    repository::{parse_money, parse_opt_uuid, parse_uuid, to_utc, BookingRepository},
};

const BOOKING_COLUMNS: &str = r#"
    id, tourist_id, accommodation_id, guide_id, agency_id, destination_id,
    tour_package_id, check_in, check_out, num_guests,
    tourist_valid_id_image, tourist_selfie_image,
    total_price, down_payment, balance_due, platform_fee, guide_payout_amount,
    is_payout_settled, status, created_at, updated_at
"#;

#[derive(FromRow)]
struct BookingRow {
    id: String,
    tourist_id: String,
    accommodation_id: Option<String>,
    guide_id: Option<String>,
    agency_id: Option<String>,
    destination_id: Option<String>,
    tour_package_id: Option<String>,
    check_in: NaiveDate,
    check_out: NaiveDate,
    num_guests: i64,
    tourist_valid_id_image: Option<String>,
    tourist_selfie_image: Option<String>,
    total_price: String,
    down_payment: String,
    balance_due: String,
    platform_fee: String,
    guide_payout_amount: String,
    is_payout_settled: i32,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        let target = BookingTarget::from_parts(
            parse_opt_uuid(row.accommodation_id)?,
            parse_opt_uuid(row.guide_id)?,
            parse_opt_uuid(row.agency_id)?,
            parse_opt_uuid(row.destination_id)?,
        )
        .map_err(|e| AppError::Database(format!("Corrupt booking {}: {}", row.id, e)))?;

        let stay = StayWindow::new(row.check_in, row.check_out)
            .map_err(|e| AppError::Database(format!("Corrupt booking {}: {}", row.id, e)))?;

        Ok(Booking {
            id: parse_uuid(&row.id)?,
            tourist_id: parse_uuid(&row.tourist_id)?,
            target,
            tour_package_id: parse_opt_uuid(row.tour_package_id)?,
            stay,
            num_guests: u32::try_from(row.num_guests)
                .map_err(|e| AppError::Database(e.to_string()))?,
            assigned_guides: Vec::new(),
            assigned_agency_guides: Vec::new(),
            tourist_valid_id_image: row.tourist_valid_id_image,
            tourist_selfie_image: row.tourist_selfie_image,
            total_price: parse_money(&row.total_price)?,
            down_payment: parse_money(&row.down_payment)?,
            balance_due: parse_money(&row.balance_due)?,
            platform_fee: parse_money(&row.platform_fee)?,
            guide_payout_amount: parse_money(&row.guide_payout_amount)?,
            is_payout_settled: row.is_payout_settled != 0,
            status: BookingStatus::parse(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid booking status: {}", row.status)))?,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    async fn load_staff(conn: &mut SqliteConnection, booking: &mut Booking) -> Result<()> {
        let id = booking.id.to_string();

        let guides: Vec<(String,)> =
            sqlx::query_as("SELECT guide_id FROM booking_assigned_guides WHERE booking_id = ?")
                .bind(&id)
                .fetch_all(&mut *conn)
                .await?;
        booking.assigned_guides = guides
            .iter()
            .map(|(g,)| parse_uuid(g))
            .collect::<Result<_>>()?;

        let roster: Vec<(String,)> = sqlx::query_as(
            "SELECT roster_guide_id FROM booking_assigned_agency_guides WHERE booking_id = ?",
        )
        .bind(&id)
        .fetch_all(&mut *conn)
        .await?;
        booking.assigned_agency_guides = roster
            .iter()
            .map(|(g,)| parse_uuid(g))
            .collect::<Result<_>>()?;

        Ok(())
    }

    async fn fetch_many(
        conn: &mut SqliteConnection,
        sql: &str,
        binds: &[String],
    ) -> Result<Vec<Booking>> {
        let mut query = sqlx::query_as::<_, BookingRow>(sql);
        for value in binds {
            query = query.bind(value.as_str());
        }
        let rows = query.fetch_all(&mut *conn).await?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            let mut booking = Self::row_to_booking(row)?;
            Self::load_staff(conn, &mut booking).await?;
            bookings.push(booking);
        }
        Ok(bookings)
    }

    /// Loads a booking on an existing connection or transaction.
    pub async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = ?",
            BOOKING_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(r) => {
                let mut booking = Self::row_to_booking(r)?;
                Self::load_staff(conn, &mut booking).await?;
                Ok(Some(booking))
            }
            None => Ok(None),
        }
    }

    /// Whether any other `Confirmed` booking for the guide overlaps `stay`.
    pub async fn has_confirmed_overlap(
        conn: &mut SqliteConnection,
        guide_id: Uuid,
        stay: &StayWindow,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM bookings
            WHERE guide_id = ?
              AND status = 'Confirmed'
              AND check_in < ?
              AND check_out > ?
              AND (? IS NULL OR id != ?)
            "#,
        )
        .bind(guide_id.to_string())
        .bind(stay.check_out())
        .bind(stay.check_in())
        .bind(exclude_booking_id.map(|id| id.to_string()))
        .bind(exclude_booking_id.map(|id| id.to_string()))
        .fetch_one(&mut *conn)
        .await?;

        Ok(count.0 > 0)
    }

    pub async fn write_status(conn: &mut SqliteConnection, id: Uuid, status: BookingStatus) -> Result<()> {
        sqlx::query("UPDATE bookings SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn write_confirmation(
        conn: &mut SqliteConnection,
        id: Uuid,
        commission: &Commission,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'Confirmed',
                platform_fee = ?,
                guide_payout_amount = ?,
                is_payout_settled = 0,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(commission.platform_fee.to_string())
        .bind(commission.guide_payout_amount.to_string())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Moves an unconfirmed booking to new dates and amounts. Returns false
    /// when the booking has left the pre-confirmation states.
    pub async fn write_schedule(
        conn: &mut SqliteConnection,
        id: Uuid,
        stay: StayWindow,
        num_guests: u32,
        quote: &PriceQuote,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET check_in = ?,
                check_out = ?,
                num_guests = ?,
                total_price = ?,
                down_payment = ?,
                balance_due = ?,
                updated_at = ?
            WHERE id = ? AND status IN ('Pending_Payment', 'Accepted')
            "#,
        )
        .bind(stay.check_in())
        .bind(stay.check_out())
        .bind(num_guests as i64)
        .bind(quote.total_price.to_string())
        .bind(quote.down_payment.to_string())
        .bind(quote.balance_due.to_string())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn write_completion(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE bookings SET status = 'Completed', balance_due = ?, updated_at = ? WHERE id = ?",
        )
        .bind(Decimal::new(0, 2).to_string())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn require(&self, id: Uuid) -> Result<Booking> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn create(&self, booking: Booking) -> Result<Booking> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, tourist_id, accommodation_id, guide_id, agency_id, destination_id,
                tour_package_id, check_in, check_out, num_guests,
                tourist_valid_id_image, tourist_selfie_image,
                total_price, down_payment, balance_due, platform_fee, guide_payout_amount,
                is_payout_settled, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(booking.id.to_string())
        .bind(booking.tourist_id.to_string())
        .bind(booking.target.accommodation_id().map(|id| id.to_string()))
        .bind(booking.target.guide_id().map(|id| id.to_string()))
        .bind(booking.target.agency_id().map(|id| id.to_string()))
        .bind(booking.target.destination_id().map(|id| id.to_string()))
        .bind(booking.tour_package_id.map(|id| id.to_string()))
        .bind(booking.stay.check_in())
        .bind(booking.stay.check_out())
        .bind(booking.num_guests as i64)
        .bind(&booking.tourist_valid_id_image)
        .bind(&booking.tourist_selfie_image)
        .bind(booking.total_price.to_string())
        .bind(booking.down_payment.to_string())
        .bind(booking.balance_due.to_string())
        .bind(booking.platform_fee.to_string())
        .bind(booking.guide_payout_amount.to_string())
        .bind(booking.is_payout_settled as i32)
        .bind(booking.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(booking.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created booking".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings ORDER BY created_at DESC LIMIT ? OFFSET ?",
            BOOKING_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            let mut booking = Self::row_to_booking(row)?;
            Self::load_staff(&mut conn, &mut booking).await?;
            bookings.push(booking);
        }
        Ok(bookings)
    }

    async fn list_for_tourist(&self, tourist_id: Uuid) -> Result<Vec<Booking>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_many(
            &mut conn,
            &format!(
                "SELECT {} FROM bookings WHERE tourist_id = ? ORDER BY created_at DESC",
                BOOKING_COLUMNS
            ),
            &[tourist_id.to_string()],
        )
        .await
    }

    async fn list_for_provider(&self, provider_id: Uuid) -> Result<Vec<Booking>> {
        let id = provider_id.to_string();
        let mut conn = self.pool.acquire().await?;
        Self::fetch_many(
            &mut conn,
            &format!(
                r#"
                SELECT {} FROM bookings
                WHERE guide_id = ?
                   OR agency_id = ?
                   OR accommodation_id IN (SELECT id FROM accommodations WHERE host_id = ?)
                ORDER BY created_at DESC
                "#,
                BOOKING_COLUMNS
            ),
            &[id.clone(), id.clone(), id],
        )
        .await
    }

    async fn set_assigned_staff(&self, id: Uuid, staff: &AssignStaffRequest) -> Result<Booking> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM booking_assigned_guides WHERE booking_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM booking_assigned_agency_guides WHERE booking_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        for guide_id in &staff.assigned_guides {
            sqlx::query("INSERT OR IGNORE INTO booking_assigned_guides (booking_id, guide_id) VALUES (?, ?)")
                .bind(&id_str)
                .bind(guide_id.to_string())
                .execute(&mut *tx)
                .await?;
        }
        for roster_id in &staff.assigned_agency_guides {
            sqlx::query(
                "INSERT OR IGNORE INTO booking_assigned_agency_guides (booking_id, roster_guide_id) VALUES (?, ?)",
            )
            .bind(&id_str)
            .bind(roster_id.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.require(id).await
    }

    async fn set_payout_settled(&self, id: Uuid, settled: bool) -> Result<Booking> {
        sqlx::query("UPDATE bookings SET is_payout_settled = ?, updated_at = ? WHERE id = ?")
            .bind(settled as i32)
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        self.require(id).await
    }

    async fn confirmed_stays_for_guide(&self, guide_id: Uuid, from: NaiveDate) -> Result<Vec<StayWindow>> {
        let rows: Vec<(NaiveDate, NaiveDate)> = sqlx::query_as(
            r#"
            SELECT check_in, check_out FROM bookings
            WHERE guide_id = ? AND status = 'Confirmed' AND check_out > ?
            ORDER BY check_in
            "#,
        )
        .bind(guide_id.to_string())
        .bind(from)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(check_in, check_out)| {
                StayWindow::new(check_in, check_out).map_err(|e| AppError::Database(e.to_string()))
            })
            .collect()
    }

    async fn delete_stale_pending(&self, created_before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM bookings WHERE status = 'Pending_Payment' AND created_at < ?")
            .bind(created_before.naive_utc())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
