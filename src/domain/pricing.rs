//! Trip pricing and commission arithmetic.
//!
//! All amounts are two-decimal fixed point, rounded half-up.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::{StayWindow, ValidationError};

/// Share of the total captured through the gateway.
pub const DOWN_PAYMENT_RATE: Decimal = Decimal::from_parts(30, 0, 0, false, 2);

/// Platform commission on the total trip price.
pub const PLATFORM_FEE_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A guide's own default rates, as published on their profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuideRates {
    pub price_per_day: Option<Decimal>,
    pub solo_price_per_day: Option<Decimal>,
    pub additional_fee_per_head: Option<Decimal>,
}

/// Rates carried by a tour package, which override the guide's defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRates {
    pub solo_price: Option<Decimal>,
    pub additional_fee_per_head: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuideComponent {
    pub rates: GuideRates,
    pub package: Option<PackageRates>,
}

impl GuideComponent {
    pub fn daily_rate(&self, num_guests: u32) -> Result<Decimal, ValidationError> {
        let solo_rate = self
            .package
            .as_ref()
            .and_then(|p| p.solo_price)
            .or(self.rates.solo_price_per_day)
            .or(self.rates.price_per_day)
            .ok_or(ValidationError::MissingGuideRate)?;

        let extra_fee = match &self.package {
            Some(package) => package.additional_fee_per_head,
            None => self.rates.additional_fee_per_head.unwrap_or(Decimal::ZERO),
        };

        if num_guests <= 1 {
            Ok(solo_rate)
        } else {
            Ok(solo_rate + Decimal::from(num_guests - 1) * extra_fee)
        }
    }
}

/// Everything the calculator needs, already resolved from the catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingInput {
    pub accommodation_nightly: Option<Decimal>,
    pub guide: Option<GuideComponent>,
    pub agency_daily: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub total_price: Decimal,
    pub down_payment: Decimal,
    pub balance_due: Decimal,
}

impl PriceQuote {
    pub fn from_total(total_price: Decimal) -> Self {
        let total_price = round_money(total_price);
        let down_payment = round_money(total_price * DOWN_PAYMENT_RATE);
        Self {
            total_price,
            down_payment,
            balance_due: total_price - down_payment,
        }
    }
}

pub fn quote(
    input: &PricingInput,
    stay: &StayWindow,
    num_guests: u32,
) -> Result<PriceQuote, ValidationError> {
    if num_guests == 0 {
        return Err(ValidationError::NoGuests);
    }
    let days = Decimal::from(stay.days());
    let mut total = Decimal::ZERO;

    if let Some(nightly) = input.accommodation_nightly {
        total += nightly * days;
    }
    if let Some(guide) = &input.guide {
        total += guide.daily_rate(num_guests)? * days;
    }
    if let Some(daily) = input.agency_daily {
        total += daily * days;
    }

    Ok(PriceQuote::from_total(total))
}

/// Platform fee and provider payout, fixed when a booking is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Commission {
    pub platform_fee: Decimal,
    pub guide_payout_amount: Decimal,
}

impl Commission {
    pub fn compute(total_price: Decimal, down_payment: Decimal) -> Self {
        let platform_fee = round_money(total_price * PLATFORM_FEE_RATE);
        Self {
            platform_fee,
            guide_payout_amount: round_money(down_payment - platform_fee),
        }
    }
}
