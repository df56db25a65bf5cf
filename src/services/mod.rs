pub mod availability;
pub mod booking_window;
pub mod capacity;
pub mod checkout;
pub mod coupons;
pub mod pricing;

pub use availability::AvailabilityExpander;
pub use booking_window::{BookingWindowPolicy, NotBookableReason, SlotDecision};
pub use capacity::{CapacityTracker, Reservation, SlotKey};
pub use checkout::CheckoutOrchestrator;
pub use coupons::CouponValidator;
pub use pricing::PricingEngine;
