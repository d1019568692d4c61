use std::sync::Arc;

use tracing::{info, warn};

use appointment_cell::services::{
    AppointmentBookingService, AppointmentStore, InMemoryAppointmentStore, InMemoryPaymentStore,
    PaymentService, PaymentStore, SupabaseAppointmentStore, SupabasePaymentStore,
};
use appointment_cell::AppointmentState;
use doctor_cell::services::{AvailabilityService, CalendarStore, InMemoryCalendarStore, SupabaseCalendarStore};
use messaging_cell::services::{
    BlobStorage, ChatSessionController, InMemoryBlobStorage, InMemoryMessageStore, MessageStore,
    MessageStoreAdapter, SupabaseBlobStorage, SupabaseMessageStore,
};
use messaging_cell::TextCodec;
use shared_config::AppConfig;

/// Every cell's service graph, wired to one persistence backend.
#[derive(Clone)]
pub struct AppServices {
    pub availability: AvailabilityService,
    pub appointments: AppointmentState,
    pub chat: ChatSessionController,
}

struct Stores {
    calendars: Arc<dyn CalendarStore>,
    appointments: Arc<dyn AppointmentStore>,
    payments: Arc<dyn PaymentStore>,
    messages: Arc<dyn MessageStore>,
    blobs: Arc<dyn BlobStorage>,
}

impl Stores {
    fn supabase(config: &AppConfig) -> Self {
        Self {
            calendars: Arc::new(SupabaseCalendarStore::new(config)),
            appointments: Arc::new(SupabaseAppointmentStore::new(config)),
            payments: Arc::new(SupabasePaymentStore::new(config)),
            messages: Arc::new(SupabaseMessageStore::new(config)),
            blobs: Arc::new(SupabaseBlobStorage::new(config)),
        }
    }

    fn in_memory() -> Self {
        Self {
            calendars: Arc::new(InMemoryCalendarStore::new()),
            appointments: Arc::new(InMemoryAppointmentStore::new()),
            payments: Arc::new(InMemoryPaymentStore::new()),
            messages: Arc::new(InMemoryMessageStore::new()),
            blobs: Arc::new(InMemoryBlobStorage::new()),
        }
    }
}

impl AppServices {
    pub fn build(config: &AppConfig, codec: TextCodec) -> Self {
        let stores = if config.is_configured() {
            info!("Using Supabase at {}", config.supabase_url);
            Stores::supabase(config)
        } else {
            warn!("Using in-process stores; data is lost on restart");
            Stores::in_memory()
        };

        let availability = AvailabilityService::new(stores.calendars, config);
        let booking = AppointmentBookingService::new(stores.appointments, availability.clone(), config);
        let payments = PaymentService::new(stores.payments, booking.clone(), config);
        let adapter = MessageStoreAdapter::new(stores.messages, config);
        let chat = ChatSessionController::new(adapter, codec, stores.blobs, booking.clone(), config);

        Self {
            availability,
            appointments: AppointmentState { booking, payments },
            chat,
        }
    }
}
