// libs/doctor-cell/src/services/calendar.rs
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, warn};

use crate::models::{AvailableSlots, Slot, SlotError};

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern compiles")
});

// Zero-padded 24h times sort lexicographically in chronological order.
static TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("time pattern compiles")
});

/// Copy-on-write transforms over a doctor's [`AvailableSlots`].
pub struct SlotCalendar;

impl SlotCalendar {
    pub fn validate_date(date: &str) -> Result<(), SlotError> {
        if !DATE_PATTERN.is_match(date) || NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(SlotError::Validation(format!("date '{}' must be a valid YYYY-MM-DD", date)));
        }
        Ok(())
    }

    pub fn validate_time(time: &str) -> Result<(), SlotError> {
        if !TIME_PATTERN.is_match(time) {
            return Err(SlotError::Validation(format!("time '{}' must be HH:MM", time)));
        }
        Ok(())
    }

    pub fn validate(date: &str, time: &str) -> Result<(), SlotError> {
        Self::validate_date(date)?;
        Self::validate_time(time)
    }

    /// Adds `time` to `date`. Fails if the pair is already offered.
    pub fn add_time(slots: &AvailableSlots, date: &str, time: &str) -> Result<AvailableSlots, SlotError> {
        Self::validate(date, time)?;

        if slots.contains(date, time) {
            return Err(SlotError::DuplicateSlot {
                date: date.to_string(),
                time: time.to_string(),
            });
        }

        Ok(Self::insert(slots, date, time))
    }

    /// Removes `time` from `date`, dropping the day once it has no times left.
    /// Removing a pair that is not offered returns an equal calendar.
    pub fn remove_time(slots: &AvailableSlots, date: &str, time: &str) -> Result<AvailableSlots, SlotError> {
        Self::validate(date, time)?;

        if !slots.contains(date, time) {
            debug!("Slot {} {} not present, nothing to remove", date, time);
        }

        Ok(Self::without(slots, date, time))
    }

    /// Removal at booking time. `slots` must be the freshly read calendar;
    /// a pair that is gone means another booking won the race.
    pub fn claim(slots: &AvailableSlots, date: &str, time: &str) -> Result<AvailableSlots, SlotError> {
        Self::validate(date, time)?;

        if !slots.contains(date, time) {
            return Err(SlotError::SlotUnavailable {
                date: date.to_string(),
                time: time.to_string(),
            });
        }

        Ok(Self::without(slots, date, time))
    }

    /// Puts a previously claimed pair back. Idempotent.
    pub fn release(slots: &AvailableSlots, date: &str, time: &str) -> Result<AvailableSlots, SlotError> {
        Self::validate(date, time)?;

        if slots.contains(date, time) {
            debug!("Slot {} {} already offered, release is a no-op", date, time);
            return Ok(slots.clone());
        }

        Ok(Self::insert(slots, date, time))
    }

    /// Narrows a raw calendar read from the store: drops malformed entries,
    /// merges repeated dates, sorts and dedups times, prunes empty days.
    pub fn normalize(raw: Vec<Slot>) -> AvailableSlots {
        let mut days: Vec<Slot> = Vec::with_capacity(raw.len());

        for slot in raw {
            if Self::validate_date(&slot.date).is_err() {
                warn!("Dropping calendar day with malformed date '{}'", slot.date);
                continue;
            }

            let date = slot.date;
            let times: Vec<String> = slot
                .time
                .into_iter()
                .filter(|time| {
                    let ok = Self::validate_time(time).is_ok();
                    if !ok {
                        warn!("Dropping malformed time '{}' on {}", time, date);
                    }
                    ok
                })
                .collect();

            match days.iter_mut().find(|day| day.date == date) {
                Some(day) => day.time.extend(times),
                None => days.push(Slot { date, time: times }),
            }
        }

        for day in &mut days {
            day.time.sort();
            day.time.dedup();
        }

        Self::finish(days)
    }

    fn insert(slots: &AvailableSlots, date: &str, time: &str) -> AvailableSlots {
        let mut next = slots.slots().to_vec();

        match next.iter_mut().find(|slot| slot.date == date) {
            Some(day) => {
                day.time.push(time.to_string());
                day.time.sort();
            }
            None => next.push(Slot {
                date: date.to_string(),
                time: vec![time.to_string()],
            }),
        }

        Self::finish(next)
    }

    fn without(slots: &AvailableSlots, date: &str, time: &str) -> AvailableSlots {
        let next = slots
            .slots()
            .iter()
            .map(|slot| {
                if slot.date == date {
                    Slot {
                        date: slot.date.clone(),
                        time: slot.time.iter().filter(|t| *t != time).cloned().collect(),
                    }
                } else {
                    slot.clone()
                }
            })
            .collect();

        Self::finish(next)
    }

    fn finish(mut days: Vec<Slot>) -> AvailableSlots {
        days.retain(|slot| !slot.time.is_empty());
        days.sort_by(|a, b| a.date.cmp(&b.date));
        AvailableSlots::new(days)
    }
}
