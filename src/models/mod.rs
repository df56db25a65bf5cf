pub mod availability;
pub mod booking;
pub mod coupon;
pub mod draft;
pub mod schedule;
pub mod time;

pub use availability::{ExpandedDay, ExpandedSlot};
pub use booking::{Booking, PaymentChannelKind, PaymentState};
pub use coupon::{Coupon, DiscountType};
pub use draft::{CouponApplication, DraftReservation, LineItem, PricedDraft, TaxMode};
pub use schedule::{DaySchedule, ScheduleTemplate, SlotTemplate};
pub use time::{TimeOfDay, TimeParseError, Weekday};
