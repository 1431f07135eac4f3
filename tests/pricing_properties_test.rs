use chrono::{Days, NaiveDate};
use localynk::domain::{
    pricing::{quote, round_money, GuideComponent, GuideRates, PricingInput},
    Commission, PriceQuote, StayWindow,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn stay(start_offset: u64, nights: u64) -> StayWindow {
    let base = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
    let check_in = base + Days::new(start_offset);
    StayWindow::new(check_in, check_in + Days::new(nights)).unwrap()
}

proptest! {
    #[test]
    fn down_payment_and_balance_partition_the_total(cents in 1i64..100_000_000) {
        let q = PriceQuote::from_total(Decimal::new(cents, 2));
        prop_assert_eq!(q.down_payment + q.balance_due, q.total_price);
        prop_assert!(q.down_payment <= q.total_price);
        prop_assert!(q.down_payment >= Decimal::ZERO);
    }

    #[test]
    fn payout_plus_fee_equals_down_payment(cents in 1i64..100_000_000) {
        let q = PriceQuote::from_total(Decimal::new(cents, 2));
        let c = Commission::compute(q.total_price, q.down_payment);
        prop_assert_eq!(c.platform_fee + c.guide_payout_amount, q.down_payment);
        prop_assert_eq!(round_money(c.platform_fee), c.platform_fee);
    }

    #[test]
    fn guide_price_grows_with_party_size(
        base in 1i64..100_000,
        extra in 0i64..10_000,
        guests in 1u32..20,
        nights in 1u64..30,
    ) {
        let input = PricingInput {
            guide: Some(GuideComponent {
                rates: GuideRates {
                    price_per_day: Some(Decimal::new(base, 2)),
                    solo_price_per_day: None,
                    additional_fee_per_head: Some(Decimal::new(extra, 2)),
                },
                package: None,
            }),
            ..Default::default()
        };
        let window = stay(0, nights);
        let smaller = quote(&input, &window, guests).unwrap();
        let larger = quote(&input, &window, guests + 1).unwrap();
        prop_assert!(larger.total_price >= smaller.total_price);
        prop_assert_eq!(
            larger.total_price - smaller.total_price,
            Decimal::new(extra, 2) * Decimal::from(nights)
        );
    }

    #[test]
    fn overlap_matches_shared_reserved_dates(
        a_start in 0u64..30,
        a_len in 1u64..10,
        b_start in 0u64..30,
        b_len in 1u64..10,
    ) {
        let a = stay(a_start, a_len);
        let b = stay(b_start, b_len);
        let shared = a.reserved_dates().any(|day| b.reserved_dates().any(|other| other == day));
        prop_assert_eq!(a.overlaps(&b), shared);
        prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
    }
}
