use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("A booking must target a Guide, Accommodation, or Agency.")]
    MissingTarget,

    #[error("Agency bookings cannot be combined with independent Guide or Accommodation bookings.")]
    AgencyNotExclusive,

    #[error("A destination is required when booking a guide or agency.")]
    MissingDestination,

    #[error("Check-out must be after check-in.")]
    CheckOutNotAfterCheckIn,

    #[error("Check-in date cannot be in the past.")]
    CheckInInPast,

    #[error("A booking needs at least one guest.")]
    NoGuests,

    #[error("The guide is already booked between {check_in} and {check_out}.")]
    DatesUnavailable {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("The selected guide has not configured a daily rate.")]
    MissingGuideRate,

    #[error("{0}")]
    UnavailableTarget(String),

    #[error("{0}")]
    InvalidField(String),
}

/// The service being booked.
///
/// A guide trip may bundle an accommodation; an agency trip never bundles
/// anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookingTarget {
    Accommodation {
        accommodation_id: Uuid,
    },
    GuideTrip {
        guide_id: Uuid,
        destination_id: Uuid,
        accommodation_id: Option<Uuid>,
    },
    AgencyTrip {
        agency_id: Uuid,
        destination_id: Uuid,
    },
}

impl BookingTarget {
    /// Builds a target from the nullable columns/fields used on the wire and
    /// in storage.
    pub fn from_parts(
        accommodation: Option<Uuid>,
        guide: Option<Uuid>,
        agency: Option<Uuid>,
        destination: Option<Uuid>,
    ) -> Result<Self, ValidationError> {
        match (accommodation, guide, agency) {
            (None, None, None) => Err(ValidationError::MissingTarget),
            (_, _, Some(_)) if accommodation.is_some() || guide.is_some() => {
                Err(ValidationError::AgencyNotExclusive)
            }
            (None, None, Some(agency_id)) => Ok(BookingTarget::AgencyTrip {
                agency_id,
                destination_id: destination.ok_or(ValidationError::MissingDestination)?,
            }),
            (accommodation_id, Some(guide_id), None) => Ok(BookingTarget::GuideTrip {
                guide_id,
                destination_id: destination.ok_or(ValidationError::MissingDestination)?,
                accommodation_id,
            }),
            (Some(accommodation_id), None, None) => {
                Ok(BookingTarget::Accommodation { accommodation_id })
            }
            _ => Err(ValidationError::MissingTarget),
        }
    }

    pub fn accommodation_id(&self) -> Option<Uuid> {
        match self {
            BookingTarget::Accommodation { accommodation_id } => Some(*accommodation_id),
            BookingTarget::GuideTrip { accommodation_id, .. } => *accommodation_id,
            BookingTarget::AgencyTrip { .. } => None,
        }
    }

    pub fn guide_id(&self) -> Option<Uuid> {
        match self {
            BookingTarget::GuideTrip { guide_id, .. } => Some(*guide_id),
            _ => None,
        }
    }

    pub fn agency_id(&self) -> Option<Uuid> {
        match self {
            BookingTarget::AgencyTrip { agency_id, .. } => Some(*agency_id),
            _ => None,
        }
    }

    pub fn destination_id(&self) -> Option<Uuid> {
        match self {
            BookingTarget::Accommodation { .. } => None,
            BookingTarget::GuideTrip { destination_id, .. }
            | BookingTarget::AgencyTrip { destination_id, .. } => Some(*destination_id),
        }
    }
}

/// A half-open stay `[check_in, check_out)`. The checkout day is free for
/// the next booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StayWindow {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayWindow {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, ValidationError> {
        if check_out <= check_in {
            return Err(ValidationError::CheckOutNotAfterCheckIn);
        }
        Ok(Self { check_in, check_out })
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    /// Billable days, never less than one.
    pub fn days(&self) -> i64 {
        (self.check_out - self.check_in).num_days().max(1)
    }

    pub fn overlaps(&self, other: &StayWindow) -> bool {
        self.check_in < other.check_out && self.check_out > other.check_in
    }

    /// Every calendar date this stay reserves.
    pub fn reserved_dates(&self) -> impl Iterator<Item = NaiveDate> {
        let check_out = self.check_out;
        self.check_in.iter_days().take_while(move |day| *day < check_out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    #[serde(rename = "Pending_Payment")]
    PendingPayment,
    Accepted,
    Declined,
    Confirmed,
    Completed,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "Pending_Payment",
            BookingStatus::Accepted => "Accepted",
            BookingStatus::Declined => "Declined",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
            BookingStatus::Refunded => "Refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending_Payment" => Some(BookingStatus::PendingPayment),
            "Accepted" => Some(BookingStatus::Accepted),
            "Declined" => Some(BookingStatus::Declined),
            "Confirmed" => Some(BookingStatus::Confirmed),
            "Completed" => Some(BookingStatus::Completed),
            "Cancelled" => Some(BookingStatus::Cancelled),
            "Refunded" => Some(BookingStatus::Refunded),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Legal next states. Who may drive each edge is decided by
    /// [`Actor::may_request`].
    pub fn successors(&self) -> &'static [BookingStatus] {
        use BookingStatus::*;
        match self {
            PendingPayment => &[Accepted, Declined, Cancelled, Confirmed],
            Accepted => &[Confirmed, Declined, Cancelled],
            Confirmed => &[Completed, Cancelled, Refunded],
            Declined | Completed | Cancelled | Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        self.successors().contains(&next)
    }

    /// Money has not moved yet.
    pub fn is_pre_confirmation(&self) -> bool {
        matches!(self, BookingStatus::PendingPayment | BookingStatus::Accepted)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The party driving a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Tourist,
    Provider,
    Admin,
    PaymentHandler,
}

impl Actor {
    pub fn may_request(&self, from: BookingStatus, to: BookingStatus) -> bool {
        use BookingStatus::*;
        match (self, to) {
            (Actor::PaymentHandler, Confirmed) => true,
            (_, Confirmed) => false,
            (Actor::Provider | Actor::Admin, Accepted | Declined) => true,
            (Actor::Tourist, Cancelled) => from.is_pre_confirmation(),
            (Actor::Admin, Cancelled) => true,
            // Compensating cancellation after a lost payment race.
            (Actor::PaymentHandler, Cancelled) => true,
            (Actor::Provider | Actor::Admin, Completed) => true,
            (Actor::Admin | Actor::PaymentHandler, Refunded) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub id: Uuid,
    pub tourist_id: Uuid,
    pub target: BookingTarget,
    pub tour_package_id: Option<Uuid>,
    pub stay: StayWindow,
    pub num_guests: u32,
    pub assigned_guides: Vec<Uuid>,
    pub assigned_agency_guides: Vec<Uuid>,
    pub tourist_valid_id_image: Option<String>,
    pub tourist_selfie_image: Option<String>,
    pub total_price: Decimal,
    pub down_payment: Decimal,
    pub balance_due: Decimal,
    pub platform_fee: Decimal,
    pub guide_payout_amount: Decimal,
    pub is_payout_settled: bool,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// What a checkout for this booking charges: the down payment, or the
    /// full price when no down payment applies.
    pub fn amount_due_now(&self) -> Decimal {
        if self.down_payment > Decimal::ZERO {
            self.down_payment
        } else {
            self.total_price
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub accommodation: Option<Uuid>,
    pub guide: Option<Uuid>,
    pub agency: Option<Uuid>,
    pub destination: Option<Uuid>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[validate(range(min = 1, message = "A booking needs at least one guest."))]
    pub num_guests: u32,
    pub tour_package_id: Option<Uuid>,
    #[validate(length(max = 500))]
    pub tourist_valid_id_image: Option<String>,
    #[validate(length(max = 500))]
    pub tourist_selfie_image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RescheduleBookingRequest {
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    #[validate(range(min = 1, message = "A booking needs at least one guest."))]
    pub num_guests: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignStaffRequest {
    #[serde(default)]
    pub assigned_guides: Vec<Uuid>,
    #[serde(default)]
    pub assigned_agency_guides: Vec<Uuid>,
}
