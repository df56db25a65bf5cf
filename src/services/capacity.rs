//! Authoritative token accounting per `(provider, date, batch)`.
//!
//! Rendered `remaining` counts are advisory; this tracker is the single gate
//! that actually admits a reservation. Increments are compare-and-swap so two
//! checkouts racing for the last token cannot both win.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::catalog::BookingCount;
use crate::errors::CapacityError;
use crate::models::ExpandedDay;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub batch_id: String,
}

struct SlotCounter {
    capacity: u32,
    booked: AtomicU32,
}

/// A granted hold on tokens. Released explicitly on every failure path;
/// consumed (not released) when the booking is recorded.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub key: SlotKey,
    pub quantity: u32,
}

#[derive(Default)]
pub struct CapacityTracker {
    counters: DashMap<SlotKey, Arc<SlotCounter>>,
}

impl CapacityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies existing-booking counts onto an expanded day. Pure annotation;
    /// missing keys mean zero booked.
    pub fn annotate(day: &mut ExpandedDay, counts: &[BookingCount]) {
        for slot in &mut day.slots {
            slot.booked = counts
                .iter()
                .filter(|c| c.date == day.date && c.batch_id == slot.batch_id)
                .map(|c| c.quantity)
                .sum();
        }
    }

    /// Atomically reserves `quantity` tokens, seeding the counter from the
    /// catalog's booked count on first touch of this key.
    ///
    /// The check and the increment are a single compare-exchange, retried on
    /// contention. Failure leaves the counter untouched.
    #[instrument(skip(self), fields(batch_id = %key.batch_id))]
    pub fn try_reserve(
        &self,
        key: SlotKey,
        capacity: u32,
        booked_seed: u32,
        quantity: u32,
    ) -> Result<Reservation, CapacityError> {
        if quantity == 0 {
            return Err(CapacityError::InvalidQuantity(quantity));
        }

        let counter = self
            .counters
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(SlotCounter {
                    capacity,
                    booked: AtomicU32::new(booked_seed),
                })
            })
            .clone();

        let mut current = counter.booked.load(Ordering::Acquire);
        loop {
            let remaining = counter.capacity.saturating_sub(current);
            if quantity > remaining {
                return Err(CapacityError::InsufficientCapacity {
                    requested: quantity,
                    remaining,
                });
            }
            match counter.booked.compare_exchange(
                current,
                current + quantity,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug!(booked = current + quantity, capacity = counter.capacity, "tokens reserved");
                    return Ok(Reservation { key, quantity });
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Returns a reservation's tokens. Idempotence is the caller's concern;
    /// each failure path releases exactly once.
    pub fn release(&self, reservation: &Reservation) {
        if let Some(counter) = self.counters.get(&reservation.key) {
            let mut current = counter.booked.load(Ordering::Acquire);
            loop {
                let next = current.saturating_sub(reservation.quantity);
                match counter.booked.compare_exchange(
                    current,
                    next,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => {
                        debug!(booked = next, "tokens released");
                        return;
                    }
                    Err(observed) => current = observed,
                }
            }
        }
    }

    /// Booked count as this tracker currently sees it, if the key has been
    /// touched.
    pub fn booked(&self, key: &SlotKey) -> Option<u32> {
        self.counters
            .get(key)
            .map(|c| c.booked.load(Ordering::Acquire))
    }
}
