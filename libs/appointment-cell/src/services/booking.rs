// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use doctor_cell::services::{AvailabilityService, SlotCalendar};
use doctor_cell::SlotError;
use shared_config::AppConfig;
use shared_database::with_write_timeout;
use shared_models::auth::User;

use crate::models::{
    slot_instant, Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::store::AppointmentStore;

/// Books appointments against doctors' slot calendars and drives their
/// status through the lifecycle.
///
/// The appointment record and the calendar are two independent writes. The
/// appointment is always committed first, so an interruption between them
/// leaves a still-offered slot rather than a claimed slot with no booking.
/// A booking is only rolled back once a fresh read shows its slot is still
/// offered.
#[derive(Clone)]
pub struct AppointmentBookingService {
    appointments: Arc<dyn AppointmentStore>,
    availability: AvailabilityService,
    lifecycle: AppointmentLifecycleService,
    write_timeout: Duration,
}

impl AppointmentBookingService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        availability: AvailabilityService,
        config: &AppConfig,
    ) -> Self {
        Self {
            appointments,
            availability,
            lifecycle: AppointmentLifecycleService::new(),
            write_timeout: config.store_write_timeout(),
        }
    }

    pub fn lifecycle(&self) -> &AppointmentLifecycleService {
        &self.lifecycle
    }

    /// Claims `(date, time)` from the doctor's calendar and records a pending
    /// appointment for `actor`.
    pub async fn book_appointment(
        &self,
        actor: &User,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking {} {} with doctor {} for patient {}",
              request.date, request.time, request.doctor_id, actor.id);

        // **Step 1: Validation**
        let doctor_id = request.doctor_id.trim();
        if doctor_id.is_empty() {
            return Err(AppointmentError::Validation("doctor_id is required".to_string()));
        }
        SlotCalendar::validate(&request.date, &request.time)?;
        let date = slot_instant(&request.date, &request.time)?;

        if actor.id == doctor_id {
            warn!("Doctor {} attempted to book themselves", doctor_id);
            return Err(AppointmentError::SelfBooking);
        }

        // **Step 2: Freshness check against the stored calendar**
        let claimed = self.availability
            .prepare_claim(doctor_id, &request.date, &request.time)
            .await
            .inspect_err(|e| {
                if matches!(e, SlotError::SlotUnavailable { .. }) {
                    info!("Slot {} {} for doctor {} was taken before submit",
                          request.date, request.time, doctor_id);
                }
            })?;

        // **Step 3: Reservation first**
        let appointment = Appointment::pending(doctor_id, &actor.id, date);
        with_write_timeout(self.write_timeout, "appointment insert", self.appointments.insert(&appointment))
            .await
            .map_err(|e| {
                error!("Failed to create appointment for doctor {}: {}", doctor_id, e);
                AppointmentError::Store(e.to_string())
            })?;

        // **Step 4: Then the calendar**
        if let Err(e) = self.availability.save_slots(doctor_id, &claimed).await {
            error!("Calendar write failed after creating appointment {}: {}", appointment.id, e);
            return self.settle_failed_claim(appointment, &request.date, &request.time, e).await;
        }

        info!("Appointment {} booked with doctor {}", appointment.id, doctor_id);
        Ok(appointment)
    }

    /// Doctor accepts a pending request. The slot stays claimed.
    pub async fn approve_appointment(&self, actor: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition_as_doctor(actor, appointment_id, AppointmentStatus::Approved).await
    }

    /// Doctor turns a pending request down and the slot goes back on offer.
    ///
    /// Declining an appointment that is already declined re-runs the release,
    /// so a decline whose calendar write failed can be retried.
    pub async fn decline_appointment(&self, actor: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id).await?;

        let declined = if current.status == AppointmentStatus::Declined && current.doctor_id == actor.id {
            info!("Appointment {} already declined, retrying slot release", appointment_id);
            current
        } else {
            self.transition_as_doctor(actor, appointment_id, AppointmentStatus::Declined).await?
        };

        if self.lifecycle.releases_slot(declined.status) {
            self.release_slot(&declined).await?;
        }

        Ok(declined)
    }

    /// Doctor closes an approved appointment, opening it to rating and payment.
    pub async fn finish_appointment(&self, actor: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition_as_doctor(actor, appointment_id, AppointmentStatus::Finished).await
    }

    /// Fetches an appointment the actor takes part in.
    pub async fn get_appointment(&self, actor: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        if !appointment.is_participant(&actor.id) {
            return Err(AppointmentError::Unauthorized);
        }
        Ok(appointment)
    }

    /// Fetches an appointment without a participant check, for internal
    /// collaborators that apply their own access rules.
    pub async fn find_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.load(appointment_id).await
    }

    pub async fn list_appointments(&self, actor: &User) -> Result<Vec<Appointment>, AppointmentError> {
        self.appointments.list_for_user(&actor.id).await.map_err(|e| {
            error!("Failed to list appointments for {}: {}", actor.id, e);
            AppointmentError::Store(e.to_string())
        })
    }

    pub async fn can_rate(&self, actor: &User, appointment_id: Uuid) -> Result<bool, AppointmentError> {
        let appointment = self.get_appointment(actor, appointment_id).await?;
        Ok(self.lifecycle.can_rate(&appointment, &actor.id))
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .get(appointment_id)
            .await
            .map_err(|e| {
                error!("Failed to load appointment {}: {}", appointment_id, e);
                AppointmentError::Store(e.to_string())
            })?
            .ok_or(AppointmentError::NotFound)
    }

    async fn transition_as_doctor(
        &self,
        actor: &User,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Doctor {} moving appointment {} to {}", actor.id, appointment_id, new_status);

        let current = self.load(appointment_id).await?;
        if current.doctor_id != actor.id {
            warn!("User {} is not the doctor of appointment {}", actor.id, appointment_id);
            return Err(AppointmentError::Unauthorized);
        }

        self.lifecycle.validate_status_transition(current.status, new_status)?;

        let updated = with_write_timeout(
            self.write_timeout,
            "appointment status update",
            self.appointments.transition(appointment_id, current.status, new_status),
        )
        .await
        .map_err(|e| {
            error!("Failed to update appointment {}: {}", appointment_id, e);
            AppointmentError::Store(e.to_string())
        })?;

        match updated {
            Some(appointment) => {
                info!("Appointment {} is now {}", appointment_id, new_status);
                Ok(appointment)
            }
            None => {
                // Someone else moved it between our read and write.
                let latest = self.load(appointment_id).await?;
                warn!("Appointment {} changed concurrently to {}", appointment_id, latest.status);
                Err(AppointmentError::InvalidStatusTransition {
                    from: latest.status,
                    to: new_status,
                })
            }
        }
    }

    // A failed or timed-out calendar write may still have landed.
    async fn settle_failed_claim(
        &self,
        appointment: Appointment,
        date: &str,
        time: &str,
        cause: SlotError,
    ) -> Result<Appointment, AppointmentError> {
        match self.availability.get_slots(&appointment.doctor_id).await {
            Ok(slots) if slots.contains(date, time) => {
                self.undo_booking(appointment.id).await;
                Err(cause.into())
            }
            Ok(_) => {
                warn!("Calendar write for appointment {} reported failure but {} {} is claimed, keeping the booking",
                      appointment.id, date, time);
                Ok(appointment)
            }
            Err(e) => {
                error!("Could not re-read calendar for appointment {}, leaving it pending: {}", appointment.id, e);
                Err(cause.into())
            }
        }
    }

    async fn release_slot(&self, declined: &Appointment) -> Result<(), AppointmentError> {
        let (date, time) = (declined.slot_date(), declined.slot_time());

        if self.slot_held_elsewhere(declined).await? {
            info!("Slot {} {} of appointment {} is booked again, calendar left as is",
                  date, time, declined.id);
            return Ok(());
        }

        self.availability
            .release(&declined.doctor_id, &date, &time)
            .await
            .map_err(|e| {
                error!("Appointment {} declined but slot {} {} was not released: {}",
                       declined.id, date, time, e);
                AppointmentError::Store(format!(
                    "appointment declined but its slot was not released, decline again to retry: {}",
                    e
                ))
            })?;
        Ok(())
    }

    async fn slot_held_elsewhere(&self, declined: &Appointment) -> Result<bool, AppointmentError> {
        let booked = self.appointments.list_for_user(&declined.doctor_id).await.map_err(|e| {
            error!("Failed to list appointments for doctor {}: {}", declined.doctor_id, e);
            AppointmentError::Store(e.to_string())
        })?;

        Ok(booked.iter().any(|other| {
            other.id != declined.id
                && other.doctor_id == declined.doctor_id
                && other.date == declined.date
                && self.lifecycle.holds_slot(other.status)
        }))
    }

    async fn undo_booking(&self, appointment_id: Uuid) {
        let undo = with_write_timeout(
            self.write_timeout,
            "appointment rollback",
            self.appointments.delete(appointment_id),
        )
        .await;

        match undo {
            Ok(()) => info!("Rolled back appointment {}", appointment_id),
            Err(e) => error!("Rollback of appointment {} failed, record remains pending: {}", appointment_id, e),
        }
    }
}
