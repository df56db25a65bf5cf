//! Derived per-date availability, produced by the expander and annotated with
//! booked counts by the capacity tracker. Nothing here is persisted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::time::TimeOfDay;

/// A weekly slot projected onto a concrete calendar date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandedSlot {
    pub from: TimeOfDay,
    pub to: TimeOfDay,
    /// Conjunction of the day-level and slot-level enabled flags. This is the
    /// single source of truth; no other component re-derives it.
    pub enabled: bool,
    pub capacity: u32,
    pub batch_id: String,
    /// Existing bookings against this `(date, batch_id)`. Zero until the
    /// capacity tracker annotates the day.
    pub booked: u32,
}

impl ExpandedSlot {
    /// Advisory remaining-token count for rendering. The authoritative check
    /// happens at reservation time.
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.booked)
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }
}

/// One calendar date in the rolling window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandedDay {
    pub date: NaiveDate,
    pub is_leave_day: bool,
    /// Day-level flag; false for leave days and weekdays absent from or
    /// disabled in the template. A day can be enabled with zero slots
    /// ("open but nothing scheduled"), distinct from a closed day.
    pub enabled: bool,
    pub slots: Vec<ExpandedSlot>,
}

impl ExpandedDay {
    pub fn closed(date: NaiveDate, is_leave_day: bool) -> Self {
        Self {
            date,
            is_leave_day,
            enabled: false,
            slots: Vec::new(),
        }
    }

    /// Total advisory tokens remaining across enabled slots.
    pub fn available_tokens(&self) -> u32 {
        if !self.enabled {
            return 0;
        }
        self.slots
            .iter()
            .filter(|s| s.enabled)
            .map(ExpandedSlot::remaining)
            .sum()
    }

    /// True when every enabled slot has no tokens left. Days with no enabled
    /// slots are not "full", they are empty.
    pub fn all_slots_full(&self) -> bool {
        let mut any = false;
        for slot in self.slots.iter().filter(|s| s.enabled) {
            any = true;
            if !slot.is_full() {
                return false;
            }
        }
        any
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(enabled: bool, capacity: u32, booked: u32) -> ExpandedSlot {
        ExpandedSlot {
            from: "09:00".parse().unwrap(),
            to: "09:30".parse().unwrap(),
            enabled,
            capacity,
            batch_id: "b1".into(),
            booked,
        }
    }

    #[test]
    fn remaining_never_underflows() {
        assert_eq!(slot(true, 2, 5).remaining(), 0);
        assert_eq!(slot(true, 3, 1).remaining(), 2);
    }

    #[test]
    fn full_and_empty_days_are_distinct() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let empty = ExpandedDay {
            date,
            is_leave_day: false,
            enabled: true,
            slots: vec![],
        };
        assert!(!empty.all_slots_full());
        assert_eq!(empty.available_tokens(), 0);

        let full = ExpandedDay {
            date,
            is_leave_day: false,
            enabled: true,
            slots: vec![slot(true, 1, 1), slot(true, 2, 2)],
        };
        assert!(full.all_slots_full());

        let open = ExpandedDay {
            date,
            is_leave_day: false,
            enabled: true,
            slots: vec![slot(true, 1, 1), slot(true, 2, 1)],
        };
        assert!(!open.all_slots_full());
        assert_eq!(open.available_tokens(), 1);
    }

    #[test]
    fn disabled_slots_do_not_count() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let day = ExpandedDay {
            date,
            is_leave_day: false,
            enabled: true,
            slots: vec![slot(false, 5, 0)],
        };
        assert_eq!(day.available_tokens(), 0);
        assert!(!day.all_slots_full());
    }
}
