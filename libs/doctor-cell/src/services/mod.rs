pub mod availability;
pub mod calendar;
pub mod store;

pub use availability::AvailabilityService;
pub use calendar::SlotCalendar;
pub use store::{CalendarStore, InMemoryCalendarStore, SupabaseCalendarStore};
