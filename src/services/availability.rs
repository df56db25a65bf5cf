//! Expands a weekly schedule template over a rolling calendar window.
//!
//! Expansion is pure: no clock, no storage. Booked counts are zero on every
//! slot it produces; the capacity tracker annotates them afterwards, and the
//! booking-window policy decides per-slot bookability against the clock.

use chrono::{Duration, NaiveDate};
use tracing::instrument;

use crate::models::{ExpandedDay, ExpandedSlot, ScheduleTemplate, Weekday};

/// Furthest ahead the next-open-slot scan looks.
pub const NEXT_SLOT_SCAN_DAYS: u32 = 60;

#[derive(Debug, Clone, Default)]
pub struct AvailabilityExpander;

impl AvailabilityExpander {
    pub fn new() -> Self {
        Self
    }

    /// Projects the weekly plan onto `[from, from + days)`, exactly `days`
    /// entries in ascending date order.
    ///
    /// A leave date always wins over the weekly plan, even when that weekday
    /// is enabled with slots. Weekdays absent from the plan produce closed
    /// days. Each slot's `enabled` is the conjunction of the day flag and the
    /// slot flag.
    #[instrument(skip(self, template), fields(provider_id = %template.provider_id))]
    pub fn expand(
        &self,
        template: &ScheduleTemplate,
        from: NaiveDate,
        days: u32,
    ) -> Vec<ExpandedDay> {
        let mut out = Vec::with_capacity(days as usize);
        for offset in 0..days {
            let date = from + Duration::days(i64::from(offset));
            out.push(self.expand_day(template, date));
        }
        out
    }

    fn expand_day(&self, template: &ScheduleTemplate, date: NaiveDate) -> ExpandedDay {
        if template.leave_dates.contains(&date) {
            return ExpandedDay::closed(date, true);
        }
        let weekday = Weekday::from(chrono::Datelike::weekday(&date));
        let Some(day_plan) = template.weekly.get(&weekday) else {
            return ExpandedDay::closed(date, false);
        };
        if !day_plan.enabled && day_plan.slots.is_empty() {
            return ExpandedDay::closed(date, false);
        }

        let slots = day_plan
            .slots
            .iter()
            .map(|slot| ExpandedSlot {
                from: slot.from,
                to: slot.to,
                enabled: day_plan.enabled && slot.enabled,
                capacity: template.slot_capacity(slot),
                batch_id: slot.batch_id.clone(),
                booked: 0,
            })
            .collect();

        ExpandedDay {
            date,
            is_leave_day: false,
            enabled: day_plan.enabled,
            slots,
        }
    }

    /// First enabled slot with tokens remaining across annotated days.
    /// Callers wanting the 60-day "next opening" hint expand with
    /// [`NEXT_SLOT_SCAN_DAYS`] and annotate before calling this.
    pub fn next_available_slot<'a>(
        &self,
        days: &'a [ExpandedDay],
    ) -> Option<(NaiveDate, &'a ExpandedSlot)> {
        days.iter().filter(|d| d.enabled).find_map(|day| {
            day.slots
                .iter()
                .find(|s| s.enabled && !s.is_full())
                .map(|s| (day.date, s))
        })
    }

    /// How many days in the window have at least one open slot.
    pub fn available_days_count(&self, days: &[ExpandedDay]) -> usize {
        days.iter()
            .filter(|d| d.enabled && d.slots.iter().any(|s| s.enabled && !s.is_full()))
            .count()
    }
}
