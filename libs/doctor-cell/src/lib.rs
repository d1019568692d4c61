pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

pub use models::{AvailableSlots, Slot, SlotError, SlotRequest};
pub use services::{AvailabilityService, CalendarStore, SlotCalendar};
