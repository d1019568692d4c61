use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use shared_config::AppConfig;
use shared_database::with_write_timeout;

use crate::models::{AvailableSlots, SlotError};
use crate::services::calendar::SlotCalendar;
use crate::services::store::CalendarStore;

/// Reads and writes doctors' slot calendars through a [`CalendarStore`].
///
/// Every write path starts from a fresh read of the stored calendar; callers'
/// cached snapshots are never written back.
#[derive(Clone)]
pub struct AvailabilityService {
    store: Arc<dyn CalendarStore>,
    write_timeout: Duration,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn CalendarStore>, config: &AppConfig) -> Self {
        Self {
            store,
            write_timeout: config.store_write_timeout(),
        }
    }

    /// Authoritative read of a doctor's calendar.
    pub async fn get_slots(&self, doctor_id: &str) -> Result<AvailableSlots, SlotError> {
        debug!("Fetching slots for doctor: {}", doctor_id);

        self.store
            .load(doctor_id)
            .await
            .map_err(|e| {
                error!("Failed to load calendar for doctor {}: {}", doctor_id, e);
                SlotError::Store(e.to_string())
            })?
            .ok_or_else(|| SlotError::DoctorNotFound(doctor_id.to_string()))
    }

    pub async fn add_time(&self, doctor_id: &str, date: &str, time: &str) -> Result<AvailableSlots, SlotError> {
        SlotCalendar::validate(date, time)?;

        let current = self.own_calendar(doctor_id).await?;
        let next = SlotCalendar::add_time(&current, date, time)?;
        self.save_slots(doctor_id, &next).await?;

        info!("Doctor {} now offers {} {}", doctor_id, date, time);
        Ok(next)
    }

    pub async fn remove_time(&self, doctor_id: &str, date: &str, time: &str) -> Result<AvailableSlots, SlotError> {
        SlotCalendar::validate(date, time)?;

        let current = self.own_calendar(doctor_id).await?;
        let next = SlotCalendar::remove_time(&current, date, time)?;
        if next != current {
            self.save_slots(doctor_id, &next).await?;
            info!("Doctor {} withdrew {} {}", doctor_id, date, time);
        }

        Ok(next)
    }

    /// Freshness check plus claim: re-reads the calendar and returns it with
    /// `(date, time)` removed. Nothing is persisted; the caller commits the
    /// result with [`save_slots`](Self::save_slots) once its reservation is
    /// recorded.
    pub async fn prepare_claim(&self, doctor_id: &str, date: &str, time: &str) -> Result<AvailableSlots, SlotError> {
        let fresh = self.get_slots(doctor_id).await?;
        SlotCalendar::claim(&fresh, date, time)
    }

    /// Re-reads the calendar, puts `(date, time)` back and persists it.
    pub async fn release(&self, doctor_id: &str, date: &str, time: &str) -> Result<AvailableSlots, SlotError> {
        let fresh = self.get_slots(doctor_id).await?;
        let next = SlotCalendar::release(&fresh, date, time)?;
        if next != fresh {
            self.save_slots(doctor_id, &next).await?;
        }

        info!("Released slot {} {} for doctor {}", date, time, doctor_id);
        Ok(next)
    }

    pub async fn save_slots(&self, doctor_id: &str, slots: &AvailableSlots) -> Result<(), SlotError> {
        with_write_timeout(self.write_timeout, "calendar save", self.store.save(doctor_id, slots))
            .await
            .map_err(|e| {
                error!("Failed to save calendar for doctor {}: {}", doctor_id, e);
                SlotError::Store(e.to_string())
            })
    }

    // A doctor editing their own calendar may not have one yet.
    async fn own_calendar(&self, doctor_id: &str) -> Result<AvailableSlots, SlotError> {
        match self.get_slots(doctor_id).await {
            Err(SlotError::DoctorNotFound(_)) => Ok(AvailableSlots::empty()),
            other => other,
        }
    }
}
