// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use doctor_cell::models::SlotError;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: String,
    pub patient_id: String,
    /// The claimed slot as a UTC instant.
    pub date: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn pending(doctor_id: &str, patient_id: &str, date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id: doctor_id.to_string(),
            patient_id: patient_id.to_string(),
            date,
            status: AppointmentStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Calendar date of the claimed slot (`YYYY-MM-DD`).
    pub fn slot_date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Calendar time of the claimed slot (`HH:MM`).
    pub fn slot_time(&self) -> String {
        self.date.format("%H:%M").to_string()
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.doctor_id == user_id || self.patient_id == user_id
    }

    /// The other side of the appointment relative to `user_id`.
    pub fn counterparty(&self, user_id: &str) -> Option<&str> {
        if self.doctor_id == user_id {
            Some(&self.patient_id)
        } else if self.patient_id == user_id {
            Some(&self.doctor_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Declined,
    Finished,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Approved => write!(f, "approved"),
            AppointmentStatus::Declined => write!(f, "declined"),
            AppointmentStatus::Finished => write!(f, "finished"),
        }
    }
}

/// Joins a slot's `YYYY-MM-DD` and `HH:MM` into the appointment instant.
pub fn slot_instant(date: &str, time: &str) -> Result<DateTime<Utc>, AppointmentError> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppointmentError::Validation(format!("invalid date '{}'", date)))?;
    let at = NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| AppointmentError::Validation(format!("invalid time '{}'", time)))?;
    Ok(day.and_time(at).and_utc())
}

// ==============================================================================
// PAYMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// One-to-one with an appointment and keyed by its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub appointment_id: Uuid,
    pub doctor_id: String,
    pub patient_id: String,
    pub amount: f64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: String,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPaymentRequest {
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingEligibility {
    pub appointment_id: Uuid,
    pub eligible: bool,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Doctors cannot book appointments with themselves")]
    SelfBooking,

    #[error("Slot {date} {time} is no longer available, please pick another")]
    SlotUnavailable { date: String, time: String },

    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor {0} not found")]
    DoctorNotFound(String),

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Payment not allowed: {0}")]
    PaymentNotEligible(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<SlotError> for AppointmentError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::Validation(msg) => AppointmentError::Validation(msg),
            SlotError::SlotUnavailable { date, time } => AppointmentError::SlotUnavailable { date, time },
            SlotError::DoctorNotFound(id) => AppointmentError::DoctorNotFound(id),
            e @ SlotError::DuplicateSlot { .. } => AppointmentError::Store(e.to_string()),
            SlotError::Store(msg) => AppointmentError::Store(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            e @ AppointmentError::SelfBooking => AppError::BadRequest(e.to_string()),
            e @ AppointmentError::SlotUnavailable { .. } => AppError::Conflict(e.to_string()),
            e @ AppointmentError::NotFound => AppError::NotFound(e.to_string()),
            e @ AppointmentError::DoctorNotFound(_) => AppError::NotFound(e.to_string()),
            e @ AppointmentError::Unauthorized => AppError::Forbidden(e.to_string()),
            e @ AppointmentError::InvalidStatusTransition { .. } => AppError::Conflict(e.to_string()),
            e @ AppointmentError::PaymentNotEligible(_) => AppError::Conflict(e.to_string()),
            AppointmentError::Store(msg) => AppError::Database(msg),
        }
    }
}
