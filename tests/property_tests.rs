//! Property-based tests for the availability, capacity, and pricing cores.
//!
//! These use proptest to verify invariants across a wide range of inputs,
//! helping to catch edge cases that unit tests might miss.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use slotbook_api::catalog::TaxSettings;
use slotbook_api::models::{
    Coupon, DaySchedule, DiscountType, LineItem, ScheduleTemplate, SlotTemplate, TaxMode,
    TimeOfDay, Weekday,
};
use slotbook_api::services::capacity::{CapacityTracker, SlotKey};
use slotbook_api::services::coupons;
use slotbook_api::services::{AvailabilityExpander, PricingEngine};

// Strategies for generating test data

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (2024i32..2030, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn slot_strategy() -> impl Strategy<Value = SlotTemplate> {
    (0u16..1380, 1u16..=60, any::<bool>(), proptest::option::of(1u32..20))
        .prop_map(|(start, len, enabled, capacity)| SlotTemplate {
            from: TimeOfDay::from_minutes(start).unwrap(),
            to: TimeOfDay::from_minutes(start + len).unwrap(),
            enabled,
            capacity,
            batch_id: format!("b-{start}"),
        })
}

fn weekday_strategy() -> impl Strategy<Value = Weekday> {
    prop_oneof![
        Just(Weekday::Sunday),
        Just(Weekday::Monday),
        Just(Weekday::Tuesday),
        Just(Weekday::Wednesday),
        Just(Weekday::Thursday),
        Just(Weekday::Friday),
        Just(Weekday::Saturday),
    ]
}

fn template_strategy() -> impl Strategy<Value = ScheduleTemplate> {
    (
        proptest::collection::btree_map(
            weekday_strategy(),
            (any::<bool>(), proptest::collection::vec(slot_strategy(), 0..4)),
            0..7,
        ),
        proptest::collection::btree_set(date_strategy(), 0..5),
        1u32..10,
    )
        .prop_map(|(weekly, leave_dates, capacity_default)| ScheduleTemplate {
            provider_id: Uuid::nil(),
            weekly: weekly
                .into_iter()
                .map(|(day, (enabled, slots))| (day, DaySchedule { enabled, slots }))
                .collect::<BTreeMap<_, _>>(),
            leave_dates: leave_dates.into_iter().collect::<BTreeSet<_>>(),
            capacity_default,
            operating_window: None,
        })
}

fn money_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000).prop_map(|paise| Decimal::new(paise, 2))
}

proptest! {
    // Property: expansion always yields exactly the requested window, in order.
    #[test]
    fn expansion_window_is_exact_and_ordered(
        template in template_strategy(),
        from in date_strategy(),
        days in 1u32..90,
    ) {
        let expanded = AvailabilityExpander::new().expand(&template, from, days);
        prop_assert_eq!(expanded.len(), days as usize);
        for (i, day) in expanded.iter().enumerate() {
            prop_assert_eq!(day.date, from + chrono::Duration::days(i as i64));
        }
    }

    // Property: a leave date always produces a closed, empty day.
    #[test]
    fn leave_dates_always_close_the_day(
        template in template_strategy(),
        from in date_strategy(),
        days in 1u32..90,
    ) {
        let expanded = AvailabilityExpander::new().expand(&template, from, days);
        for day in &expanded {
            if template.leave_dates.contains(&day.date) {
                prop_assert!(day.is_leave_day);
                prop_assert!(!day.enabled);
                prop_assert!(day.slots.is_empty());
            }
        }
    }

    // Property: no expanded slot is enabled unless both its day and its
    // template slot are, and every capacity honors the default fallback.
    #[test]
    fn slot_flags_and_capacities_derive_from_the_template(
        template in template_strategy(),
        from in date_strategy(),
    ) {
        let expanded = AvailabilityExpander::new().expand(&template, from, 28);
        for day in &expanded {
            let weekday = Weekday::from(chrono::Datelike::weekday(&day.date));
            let Some(plan) = template.weekly.get(&weekday) else { continue };
            if day.is_leave_day {
                continue;
            }
            for (slot, planned) in day.slots.iter().zip(&plan.slots) {
                prop_assert_eq!(slot.enabled, plan.enabled && planned.enabled);
                prop_assert_eq!(
                    slot.capacity,
                    planned.capacity.unwrap_or(template.capacity_default)
                );
                prop_assert!(slot.capacity >= 1);
            }
        }
    }
}

proptest! {
    // Property: no interleaving of reserves can push booked past capacity.
    #[test]
    fn reservations_never_oversell(
        capacity in 1u32..20,
        seed in 0u32..20,
        requests in proptest::collection::vec(1u32..5, 1..30),
    ) {
        let tracker = CapacityTracker::new();
        let key = SlotKey {
            provider_id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            batch_id: "b".into(),
        };
        let mut granted = seed.min(capacity);
        for quantity in requests {
            if tracker.try_reserve(key.clone(), capacity, seed, quantity).is_ok() {
                granted += quantity;
            }
        }
        prop_assert!(granted <= capacity.max(seed));
        let booked = tracker.booked(&key).unwrap_or(0);
        prop_assert!(booked <= capacity.max(seed));
    }
}

proptest! {
    // Property: pricing never yields a negative total, and inclusive mode
    // never reports tax.
    #[test]
    fn totals_are_non_negative(
        unit_price in money_strategy(),
        quantity in 1u32..10,
        discount in money_strategy(),
        rate in 0u32..30,
        inclusive in any::<bool>(),
    ) {
        let items = vec![LineItem {
            name: "Consultation".into(),
            unit_price,
            quantity,
        }];
        let coupon = slotbook_api::models::CouponApplication {
            code: "C".into(),
            discount_type: DiscountType::Fixed,
            discount_value: discount,
            discount_amount: discount,
            total_after_discount: Decimal::ZERO,
        };
        let tax = TaxSettings {
            mode: if inclusive { TaxMode::Inclusive } else { TaxMode::Exclusive },
            rate: Decimal::from(rate),
        };
        let priced = PricingEngine::new().price(&items, &tax, Some(&coupon));
        prop_assert!(priced.total >= Decimal::ZERO);
        prop_assert!(priced.discount_amount <= priced.subtotal);
        if inclusive {
            prop_assert_eq!(priced.tax_amount, Decimal::ZERO);
            prop_assert_eq!(priced.total, priced.subtotal - priced.discount_amount);
        }
    }

    // Property: a fixed coupon never discounts more than the total, and a
    // percentage coupon discounts proportionally.
    #[test]
    fn coupon_discounts_are_bounded(
        total in money_strategy(),
        value in money_strategy(),
        percentage in any::<bool>(),
    ) {
        let coupon = Coupon {
            id: Uuid::nil(),
            provider_id: Uuid::nil(),
            code: "C".into(),
            discount_type: if percentage { DiscountType::Percentage } else { DiscountType::Fixed },
            discount_value: if percentage { value.min(Decimal::ONE_HUNDRED) } else { value },
            min_booking_amount: None,
            usage_limit: None,
            usage_count: 0,
            valid_from: chrono::Utc::now() - chrono::Duration::days(1),
            valid_until: chrono::Utc::now() + chrono::Duration::days(1),
        };
        let applied = coupons::apply(&coupon, total, chrono::Utc::now()).unwrap();
        prop_assert!(applied.discount_amount <= total);
        prop_assert!(applied.total_after_discount >= Decimal::ZERO);
        prop_assert_eq!(applied.total_after_discount, total - applied.discount_amount);
    }
}
