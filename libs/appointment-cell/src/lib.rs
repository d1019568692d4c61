pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Appointment, AppointmentError, AppointmentStatus, PaymentRecord, PaymentStatus};
pub use router::{appointment_routes, AppointmentState};
pub use services::{AppointmentBookingService, AppointmentStore, PaymentService, PaymentStore};
