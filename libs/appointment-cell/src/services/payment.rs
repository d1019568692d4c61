// libs/appointment-cell/src/services/payment.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::with_write_timeout;
use shared_models::auth::User;

use crate::models::{AppointmentError, PaymentRecord, PaymentStatus};
use crate::services::booking::AppointmentBookingService;
use crate::services::store::PaymentStore;

/// Records payments for finished appointments. Checkout itself happens at an
/// external processor; this ledger only tracks `pending`/`paid`.
#[derive(Clone)]
pub struct PaymentService {
    payments: Arc<dyn PaymentStore>,
    booking: AppointmentBookingService,
    write_timeout: Duration,
}

impl PaymentService {
    pub fn new(payments: Arc<dyn PaymentStore>, booking: AppointmentBookingService, config: &AppConfig) -> Self {
        Self {
            payments,
            booking,
            write_timeout: config.store_write_timeout(),
        }
    }

    /// Opens a pending payment for a finished appointment. Calling it again
    /// returns the existing record untouched.
    pub async fn open_payment(
        &self,
        actor: &User,
        appointment_id: Uuid,
        amount: f64,
    ) -> Result<PaymentRecord, AppointmentError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppointmentError::Validation("amount must be a positive number".to_string()));
        }

        let appointment = self.booking.get_appointment(actor, appointment_id).await?;
        if appointment.patient_id != actor.id {
            return Err(AppointmentError::Unauthorized);
        }
        if !self.booking.lifecycle().can_open_payment(&appointment) {
            return Err(AppointmentError::PaymentNotEligible(format!(
                "appointment is {}, payment opens once it is finished",
                appointment.status
            )));
        }

        if let Some(existing) = self.lookup(appointment_id).await? {
            return Ok(existing);
        }

        let record = PaymentRecord {
            appointment_id,
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            amount,
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
        };

        with_write_timeout(self.write_timeout, "payment insert", self.payments.insert(&record))
            .await
            .map_err(|e| {
                error!("Failed to open payment for {}: {}", appointment_id, e);
                AppointmentError::Store(e.to_string())
            })?;

        info!("Opened payment of {:.2} for appointment {}", amount, appointment_id);
        Ok(record)
    }

    /// Applies the processor's success confirmation on the patient's side.
    /// Idempotent.
    pub async fn confirm_payment(&self, actor: &User, appointment_id: Uuid) -> Result<PaymentRecord, AppointmentError> {
        let existing = self.payment_for(actor, appointment_id).await?.ok_or_else(|| {
            AppointmentError::PaymentNotEligible("no payment has been opened".to_string())
        })?;
        if existing.patient_id != actor.id {
            warn!("User {} tried to confirm payment for appointment {}", actor.id, appointment_id);
            return Err(AppointmentError::Unauthorized);
        }

        if existing.status == PaymentStatus::Paid {
            return Ok(existing);
        }

        let paid = with_write_timeout(self.write_timeout, "payment confirm", self.payments.mark_paid(appointment_id))
            .await
            .map_err(|e| {
                error!("Failed to confirm payment for {}: {}", appointment_id, e);
                AppointmentError::Store(e.to_string())
            })?
            .ok_or(AppointmentError::NotFound)?;

        info!("Payment for appointment {} confirmed", appointment_id);
        Ok(paid)
    }

    /// The payment record for an appointment the actor takes part in, if any.
    pub async fn payment_for(&self, actor: &User, appointment_id: Uuid) -> Result<Option<PaymentRecord>, AppointmentError> {
        self.booking.get_appointment(actor, appointment_id).await?;
        self.lookup(appointment_id).await
    }

    async fn lookup(&self, appointment_id: Uuid) -> Result<Option<PaymentRecord>, AppointmentError> {
        self.payments.get(appointment_id).await.map_err(|e| {
            error!("Failed to load payment for {}: {}", appointment_id, e);
            AppointmentError::Store(e.to_string())
        })
    }
}
