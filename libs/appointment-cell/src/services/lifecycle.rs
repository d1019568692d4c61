// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

/// Status rules for appointments. Status only ever moves forward:
///
/// ```text
/// pending --approve--> approved --finish--> finished
///    \
///     --decline--> declined
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Approved,
                AppointmentStatus::Declined,
            ],
            AppointmentStatus::Approved => vec![AppointmentStatus::Finished],
            // Terminal states - no transitions allowed
            AppointmentStatus::Declined => vec![],
            AppointmentStatus::Finished => vec![],
        }
    }

    pub fn is_terminal(&self, status: AppointmentStatus) -> bool {
        self.get_valid_transitions(status).is_empty()
    }

    /// Whether the status change hands the slot back to the doctor's calendar.
    pub fn releases_slot(&self, new_status: AppointmentStatus) -> bool {
        new_status == AppointmentStatus::Declined
    }

    /// Whether an appointment in `status` keeps its slot off the calendar.
    pub fn holds_slot(&self, status: AppointmentStatus) -> bool {
        !self.releases_slot(status)
    }

    /// A patient may rate their doctor once the appointment has finished.
    pub fn can_rate(&self, appointment: &Appointment, actor_id: &str) -> bool {
        appointment.status == AppointmentStatus::Finished && appointment.patient_id == actor_id
    }

    /// A payment record may be opened once the appointment has finished.
    pub fn can_open_payment(&self, appointment: &Appointment) -> bool {
        appointment.status == AppointmentStatus::Finished
    }
}
