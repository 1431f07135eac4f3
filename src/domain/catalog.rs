//! Read models owned by the account, catalog and roster services.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::pricing::{GuideRates, PackageRates};

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub is_tourist: bool,
    pub is_local_guide: bool,
    pub guide_approved: bool,
    pub is_agency: bool,
    pub is_admin: bool,
    pub price_per_day: Option<Decimal>,
    pub solo_price_per_day: Option<Decimal>,
    pub multiple_additional_fee_per_head: Option<Decimal>,
    pub booking_count: i64,
    pub confirmed_booking_count: i64,
    pub subscription_expires_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn is_bookable_guide(&self) -> bool {
        self.is_local_guide && self.guide_approved
    }

    pub fn guide_rates(&self) -> GuideRates {
        GuideRates {
            price_per_day: self.price_per_day,
            solo_price_per_day: self.solo_price_per_day,
            additional_fee_per_head: self.multiple_additional_fee_per_head,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Destination {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Accommodation {
    pub id: Uuid,
    pub host_id: Uuid,
    pub destination_id: Option<Uuid>,
    pub title: String,
    pub price: Decimal,
    pub is_approved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TourPackage {
    pub id: Uuid,
    pub guide_id: Uuid,
    pub main_destination_id: Option<Uuid>,
    pub name: String,
    pub price_per_day: Decimal,
    pub solo_price: Option<Decimal>,
    pub additional_fee_per_head: Decimal,
    pub is_active: bool,
}

impl TourPackage {
    pub fn rates(&self) -> PackageRates {
        PackageRates {
            solo_price: self.solo_price,
            additional_fee_per_head: self.additional_fee_per_head,
        }
    }

    /// Whether a tourist may pick this package explicitly for a trip with `guide_id`.
    pub fn is_offered_by(&self, guide_id: Uuid) -> bool {
        self.is_active && self.guide_id == guide_id
    }
}
