//! Per-slot bookability against the clock.
//!
//! The checks run in a fixed precedence order and report only the first
//! failure: booking-hours clamp, then advance horizon, then same-day past
//! slots, then capacity. Callers evaluate enabled slots only; disabled slots
//! never reach this policy.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::models::{ExpandedSlot, TimeOfDay};

/// Why a slot cannot be booked right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotBookableReason {
    /// The current wall-clock time falls outside the provider's operating
    /// window for *making* bookings.
    OutsideBookingHours,
    /// The requested date is beyond the advance horizon.
    TooFarInAdvance,
    /// Date before today, or a same-day slot whose start time has passed.
    SlotInPast,
    FullyBooked,
}

/// Advisory flags that do not block booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotWarning {
    /// The slot starts within the operating window but runs past its end.
    RunsPastClose,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SlotDecision {
    pub bookable: bool,
    pub reason: Option<NotBookableReason>,
    pub warning: Option<SlotWarning>,
}

impl SlotDecision {
    fn blocked(reason: NotBookableReason, warning: Option<SlotWarning>) -> Self {
        Self {
            bookable: false,
            reason: Some(reason),
            warning,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BookingWindowPolicy {
    /// Furthest-ahead bookable date, in days from today, inclusive.
    advance_horizon_days: u32,
}

impl BookingWindowPolicy {
    pub fn new(advance_horizon_days: u32) -> Self {
        Self {
            advance_horizon_days,
        }
    }

    /// Evaluates one slot on one date against `now` (provider-local wall
    /// clock). Same-day comparisons use minutes of day; a slot starting at
    /// exactly the current minute is still bookable.
    pub fn evaluate(
        &self,
        now: NaiveDateTime,
        date: NaiveDate,
        slot: &ExpandedSlot,
        operating_window: Option<(TimeOfDay, TimeOfDay)>,
    ) -> SlotDecision {
        let warning = operating_window.and_then(|(_, close)| {
            (slot.from <= close && slot.to > close).then_some(SlotWarning::RunsPastClose)
        });

        if let Some((open, close)) = operating_window {
            let now_minutes = (now.time().hour() * 60 + now.time().minute()) as u16;
            if now_minutes < open.minutes_of_day() || now_minutes >= close.minutes_of_day() {
                return SlotDecision::blocked(NotBookableReason::OutsideBookingHours, warning);
            }
        }

        let today = now.date();
        if date > today + Duration::days(i64::from(self.advance_horizon_days)) {
            return SlotDecision::blocked(NotBookableReason::TooFarInAdvance, warning);
        }

        if date < today {
            return SlotDecision::blocked(NotBookableReason::SlotInPast, warning);
        }

        if date == today {
            let now_minutes = (now.time().hour() * 60 + now.time().minute()) as u16;
            if slot.from.minutes_of_day() < now_minutes {
                return SlotDecision::blocked(NotBookableReason::SlotInPast, warning);
            }
        }

        if slot.is_full() {
            return SlotDecision::blocked(NotBookableReason::FullyBooked, warning);
        }

        SlotDecision {
            bookable: true,
            reason: None,
            warning,
        }
    }
}
