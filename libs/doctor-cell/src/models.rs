// libs/doctor-cell/src/models.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

// ==============================================================================
// SLOT CALENDAR MODELS
// ==============================================================================

/// One bookable day: a `YYYY-MM-DD` date and its `HH:MM` times, ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub date: String,
    pub time: Vec<String>,
}

impl Slot {
    pub fn contains(&self, time: &str) -> bool {
        self.time.iter().any(|t| t == time)
    }
}

/// A doctor's availability calendar, unique by date and ordered by date.
///
/// Values are never mutated in place: every calendar operation returns a new
/// `AvailableSlots`, so snapshots handed out earlier stay valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailableSlots(Vec<Slot>);

impl AvailableSlots {
    pub fn new(slots: Vec<Slot>) -> Self {
        Self(slots)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn slots(&self) -> &[Slot] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn day(&self, date: &str) -> Option<&Slot> {
        self.0.iter().find(|slot| slot.date == date)
    }

    pub fn contains(&self, date: &str, time: &str) -> bool {
        self.day(date).is_some_and(|slot| slot.contains(time))
    }

    /// Total number of bookable (date, time) pairs.
    pub fn len(&self) -> usize {
        self.0.iter().map(|slot| slot.time.len()).sum()
    }
}

impl From<Vec<Slot>> for AvailableSlots {
    fn from(slots: Vec<Slot>) -> Self {
        Self(slots)
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRequest {
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSlotsResponse {
    pub doctor_id: String,
    pub available_slots: AvailableSlots,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Slot {date} {time} already exists")]
    DuplicateSlot { date: String, time: String },

    #[error("Slot {date} {time} is no longer available")]
    SlotUnavailable { date: String, time: String },

    #[error("Doctor {0} not found")]
    DoctorNotFound(String),

    #[error("Calendar store error: {0}")]
    Store(String),
}

impl From<SlotError> for AppError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::Validation(msg) => AppError::ValidationError(msg),
            e @ SlotError::DuplicateSlot { .. } => AppError::Conflict(e.to_string()),
            e @ SlotError::SlotUnavailable { .. } => AppError::Conflict(e.to_string()),
            e @ SlotError::DoctorNotFound(_) => AppError::NotFound(e.to_string()),
            SlotError::Store(msg) => AppError::Database(msg),
        }
    }
}
