//! Provider schedule templates: the weekly recurring plan plus leave-date
//! exceptions that the availability expander projects over a calendar window.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::time::{TimeOfDay, Weekday};
use crate::errors::ServiceError;

/// One recurring slot within a weekly day plan.
///
/// `batch_id` identifies this recurring slot across every expanded calendar
/// date; existing bookings are aggregated per `(date, batch_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotTemplate {
    pub from: TimeOfDay,
    pub to: TimeOfDay,
    pub enabled: bool,
    /// Per-slot token capacity; falls back to the template default when absent.
    pub capacity: Option<u32>,
    pub batch_id: String,
}

/// A single weekday's plan. Slots are kept in source order and are not
/// de-duplicated; overlapping source data passes through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub enabled: bool,
    #[serde(default)]
    pub slots: Vec<SlotTemplate>,
}

/// Per-provider weekly recurring plan plus leave-date exceptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleTemplate {
    pub provider_id: Uuid,
    /// Weekly plan keyed by weekday. Days absent from the map contribute no
    /// slots.
    pub weekly: BTreeMap<Weekday, DaySchedule>,
    /// Calendar dates on which the provider is entirely unavailable,
    /// overriding the weekly plan.
    #[serde(default)]
    pub leave_dates: BTreeSet<NaiveDate>,
    /// Capacity used by slots that carry no capacity of their own.
    pub capacity_default: u32,
    /// Window of wall-clock time during which bookings may be *made*
    /// (independent of when the appointment occurs).
    #[serde(default)]
    pub operating_window: Option<(TimeOfDay, TimeOfDay)>,
}

impl ScheduleTemplate {
    /// Validates a template at ingestion.
    ///
    /// Zero- or negative-duration slots (`to <= from`) are rejected here so
    /// the expander never has to reason about them; the source system let
    /// them through silently.
    pub fn validate(&self) -> Result<(), ServiceError> {
        for (day, schedule) in &self.weekly {
            for slot in &schedule.slots {
                if slot.to <= slot.from {
                    return Err(ServiceError::ValidationError(format!(
                        "slot {} on {} has non-positive duration ({} to {})",
                        slot.batch_id, day, slot.from, slot.to
                    )));
                }
                if slot.batch_id.trim().is_empty() {
                    return Err(ServiceError::ValidationError(format!(
                        "slot {}-{} on {} has an empty batch id",
                        slot.from, slot.to, day
                    )));
                }
            }
        }
        Ok(())
    }

    /// Effective capacity for a slot, applying the template default.
    pub fn slot_capacity(&self, slot: &SlotTemplate) -> u32 {
        slot.capacity.unwrap_or(self.capacity_default)
    }
}
