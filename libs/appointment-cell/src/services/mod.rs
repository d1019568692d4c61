pub mod booking;
pub mod lifecycle;
pub mod payment;
pub mod store;

pub use booking::AppointmentBookingService;
pub use lifecycle::AppointmentLifecycleService;
pub use payment::PaymentService;
pub use store::{
    AppointmentStore, InMemoryAppointmentStore, InMemoryPaymentStore, PaymentStore,
    SupabaseAppointmentStore, SupabasePaymentStore,
};
