use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        pricing::{self, GuideComponent, PricingInput},
        Account, AssignStaffRequest, Booking, BookingStatus, BookingTarget, CreateBookingRequest,
        PriceQuote, RescheduleBookingRequest, StayWindow, ValidationError,
    },
    error::{AppError, Result},
    repository::{AccountRepository, BookingRepository, CatalogRepository},
    service::{AvailabilityChecker, BookingStateMachine},
};

pub struct BookingService {
    booking_repo: Arc<dyn BookingRepository>,
    account_repo: Arc<dyn AccountRepository>,
    catalog_repo: Arc<dyn CatalogRepository>,
    availability: Arc<AvailabilityChecker>,
    state_machine: Arc<BookingStateMachine>,
    agency_daily_rate: Decimal,
}

impl BookingService {
    pub fn new(
        booking_repo: Arc<dyn BookingRepository>,
        account_repo: Arc<dyn AccountRepository>,
        catalog_repo: Arc<dyn CatalogRepository>,
        availability: Arc<AvailabilityChecker>,
        state_machine: Arc<BookingStateMachine>,
        agency_daily_rate: Decimal,
    ) -> Self {
        Self {
            booking_repo,
            account_repo,
            catalog_repo,
            availability,
            state_machine,
            agency_daily_rate,
        }
    }

    pub async fn create(&self, tourist: &Account, request: CreateBookingRequest) -> Result<Booking> {
        request.validate().map_err(field_errors)?;

        let target = BookingTarget::from_parts(
            request.accommodation,
            request.guide,
            request.agency,
            request.destination,
        )?;
        let stay = StayWindow::new(request.check_in, request.check_out)?;
        ensure_not_past(stay.check_in())?;

        self.ensure_bookable(&target).await?;

        let (tour_package_id, quote) = self
            .price(&target, request.tour_package_id, &stay, request.num_guests)
            .await?;

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            tourist_id: tourist.id,
            target,
            tour_package_id,
            stay,
            num_guests: request.num_guests,
            assigned_guides: Vec::new(),
            assigned_agency_guides: Vec::new(),
            tourist_valid_id_image: request.tourist_valid_id_image,
            tourist_selfie_image: request.tourist_selfie_image,
            total_price: quote.total_price,
            down_payment: quote.down_payment,
            balance_due: quote.balance_due,
            platform_fee: Decimal::new(0, 2),
            guide_payout_amount: Decimal::new(0, 2),
            is_payout_settled: false,
            status: BookingStatus::PendingPayment,
            created_at: now,
            updated_at: now,
        };

        let booking = self.booking_repo.create(booking).await?;
        tracing::info!(
            booking_id = %booking.id,
            tourist_id = %tourist.id,
            total_price = %booking.total_price,
            "Booking created"
        );
        Ok(booking)
    }

    /// Changes dates or party size before any money has moved, re-pricing
    /// the booking. Not allowed while a checkout is open.
    pub async fn reschedule(
        &self,
        viewer: &Account,
        booking_id: Uuid,
        request: RescheduleBookingRequest,
    ) -> Result<Booking> {
        request.validate().map_err(field_errors)?;

        let booking = self.require(booking_id).await?;
        if booking.tourist_id != viewer.id && !viewer.is_admin {
            return Err(AppError::Forbidden);
        }
        if !booking.status.is_pre_confirmation() {
            return Err(AppError::Conflict(format!(
                "A {} booking can no longer be changed",
                booking.status
            )));
        }

        let check_in = request.check_in.unwrap_or(booking.stay.check_in());
        let check_out = request.check_out.unwrap_or(booking.stay.check_out());
        let stay = StayWindow::new(check_in, check_out)?;
        if check_in != booking.stay.check_in() {
            ensure_not_past(check_in)?;
        }
        let num_guests = request.num_guests.unwrap_or(booking.num_guests);

        let (_, quote) = self
            .price(&booking.target, booking.tour_package_id, &stay, num_guests)
            .await?;

        self.state_machine
            .reschedule(booking_id, stay, num_guests, quote)
            .await
    }

    pub async fn get(&self, viewer: &Account, booking_id: Uuid) -> Result<Booking> {
        let booking = self.require(booking_id).await?;
        if viewer.is_admin || booking.tourist_id == viewer.id {
            return Ok(booking);
        }
        if self.state_machine.provider_of(&booking).await? == viewer.id {
            return Ok(booking);
        }
        Err(AppError::Forbidden)
    }

    /// Admins see everything; everyone else sees the bookings they made
    /// plus the bookings made with them.
    pub async fn list_for(&self, viewer: &Account, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        if viewer.is_admin {
            return self.booking_repo.list(limit, offset).await;
        }

        let mut bookings = self.booking_repo.list_for_tourist(viewer.id).await?;
        bookings.extend(self.booking_repo.list_for_provider(viewer.id).await?);

        let mut seen = HashSet::new();
        bookings.retain(|b| seen.insert(b.id));
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = usize::try_from(offset.max(0)).unwrap_or(0);
        let limit = usize::try_from(limit.max(0)).unwrap_or(0);
        Ok(bookings.into_iter().skip(offset).take(limit).collect())
    }

    pub async fn transition(
        &self,
        viewer: &Account,
        booking_id: Uuid,
        next: BookingStatus,
    ) -> Result<Booking> {
        self.state_machine.transition(booking_id, viewer, next).await
    }

    pub async fn assign_staff(
        &self,
        viewer: &Account,
        booking_id: Uuid,
        request: AssignStaffRequest,
    ) -> Result<Booking> {
        let booking = self.require(booking_id).await?;
        let provider_id = self.state_machine.provider_of(&booking).await?;
        if provider_id != viewer.id && !viewer.is_admin {
            return Err(AppError::Forbidden);
        }
        if !matches!(booking.status, BookingStatus::Accepted | BookingStatus::Confirmed) {
            return Err(AppError::Conflict(format!(
                "Staff can only be assigned to Accepted or Confirmed bookings, not {}",
                booking.status
            )));
        }

        self.booking_repo.set_assigned_staff(booking_id, &request).await
    }

    /// Admin bookkeeping for the provider payout. Amounts stay untouched.
    pub async fn set_payout_settled(&self, booking_id: Uuid, settled: bool) -> Result<Booking> {
        let booking = self.require(booking_id).await?;
        if !matches!(booking.status, BookingStatus::Confirmed | BookingStatus::Completed) {
            return Err(AppError::Conflict(format!(
                "Payout can only be settled for Confirmed or Completed bookings, not {}",
                booking.status
            )));
        }

        let booking = self.booking_repo.set_payout_settled(booking_id, settled).await?;
        tracing::info!(booking_id = %booking_id, settled, "Payout settlement updated");
        Ok(booking)
    }

    pub async fn blocked_dates(&self, guide_id: Uuid, from: Option<NaiveDate>) -> Result<Vec<NaiveDate>> {
        let from = from.unwrap_or_else(|| Utc::now().date_naive());
        self.availability.blocked_dates(guide_id, from).await
    }

    async fn require(&self, booking_id: Uuid) -> Result<Booking> {
        self.booking_repo
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    async fn ensure_bookable(&self, target: &BookingTarget) -> Result<()> {
        if let Some(accommodation_id) = target.accommodation_id() {
            let accommodation = self.catalog_repo.find_accommodation(accommodation_id).await?;
            if !accommodation.map(|a| a.is_approved).unwrap_or(false) {
                return Err(ValidationError::UnavailableTarget(
                    "This accommodation is not available for booking.".to_string(),
                )
                .into());
            }
        }

        if let Some(guide_id) = target.guide_id() {
            let guide = self.account_repo.find_by_id(guide_id).await?;
            if !guide.map(|g| g.is_bookable_guide()).unwrap_or(false) {
                return Err(ValidationError::UnavailableTarget(
                    "This guide is not available for booking.".to_string(),
                )
                .into());
            }
        }

        if let Some(agency_id) = target.agency_id() {
            let agency = self.account_repo.find_by_id(agency_id).await?;
            if !agency.map(|a| a.is_agency).unwrap_or(false) {
                return Err(ValidationError::UnavailableTarget(
                    "This agency is not available for booking.".to_string(),
                )
                .into());
            }
        }

        if let Some(destination_id) = target.destination_id() {
            if self.catalog_repo.find_destination(destination_id).await?.is_none() {
                return Err(ValidationError::UnavailableTarget(
                    "The selected destination does not exist.".to_string(),
                )
                .into());
            }
        }

        Ok(())
    }

    /// Resolves catalog rates for `target` and prices the stay. Returns the
    /// tour package the guide component was priced from, if any.
    async fn price(
        &self,
        target: &BookingTarget,
        requested_package: Option<Uuid>,
        stay: &StayWindow,
        num_guests: u32,
    ) -> Result<(Option<Uuid>, PriceQuote)> {
        let mut input = PricingInput::default();
        let mut package_id = None;

        if let Some(accommodation_id) = target.accommodation_id() {
            let accommodation = self
                .catalog_repo
                .find_accommodation(accommodation_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Accommodation not found".to_string()))?;
            input.accommodation_nightly = Some(accommodation.price);
        }

        if let BookingTarget::GuideTrip { guide_id, destination_id, .. } = target {
            let guide = self
                .account_repo
                .find_by_id(*guide_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Guide not found".to_string()))?;

            let explicit = match requested_package {
                Some(id) => self
                    .catalog_repo
                    .find_tour_package(id)
                    .await?
                    .filter(|p| p.is_offered_by(*guide_id)),
                None => None,
            };
            let package = match explicit {
                Some(package) => Some(package),
                None => self.catalog_repo.find_package_for(*guide_id, *destination_id).await?,
            };

            package_id = package.as_ref().map(|p| p.id);
            input.guide = Some(GuideComponent {
                rates: guide.guide_rates(),
                package: package.map(|p| p.rates()),
            });
        }

        if target.agency_id().is_some() {
            input.agency_daily = Some(self.agency_daily_rate);
        }

        let quote = pricing::quote(&input, stay, num_guests)?;
        Ok((package_id, quote))
    }
}

fn ensure_not_past(check_in: NaiveDate) -> Result<()> {
    if check_in < Utc::now().date_naive() {
        return Err(ValidationError::CheckInInPast.into());
    }
    Ok(())
}

fn field_errors(errors: validator::ValidationErrors) -> AppError {
    ValidationError::InvalidField(errors.to_string()).into()
}
