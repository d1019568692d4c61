// libs/doctor-cell/src/services/store.rs
use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AvailableSlots, Slot};
use crate::services::calendar::SlotCalendar;

/// Persistence of the `available_slots` field on a doctor's profile record.
#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// `None` when no doctor record exists for `doctor_id`.
    async fn load(&self, doctor_id: &str) -> Result<Option<AvailableSlots>>;

    async fn save(&self, doctor_id: &str, slots: &AvailableSlots) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct DoctorSlotsRow {
    #[serde(default)]
    available_slots: Option<Vec<Slot>>,
}

pub struct SupabaseCalendarStore {
    supabase: SupabaseClient,
}

impl SupabaseCalendarStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl CalendarStore for SupabaseCalendarStore {
    async fn load(&self, doctor_id: &str) -> Result<Option<AvailableSlots>> {
        let path = format!(
            "/rest/v1/doctors?id=eq.{}&select=id,available_slots",
            urlencoding::encode(doctor_id)
        );
        let rows: Vec<DoctorSlotsRow> = self.supabase.request(Method::GET, &path, None, None).await?;

        Ok(rows.into_iter().next().map(|row| {
            SlotCalendar::normalize(row.available_slots.unwrap_or_default())
        }))
    }

    async fn save(&self, doctor_id: &str, slots: &AvailableSlots) -> Result<()> {
        debug!("Persisting {} slots for doctor {}", slots.len(), doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", urlencoding::encode(doctor_id));
        let rows: Vec<serde_json::Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(json!({ "available_slots": slots })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if rows.is_empty() {
            return Err(anyhow!("doctor {} not found", doctor_id));
        }
        Ok(())
    }
}

/// Process-local calendar store, used when no remote store is configured and
/// in tests.
#[derive(Default)]
pub struct InMemoryCalendarStore {
    calendars: RwLock<HashMap<String, AvailableSlots>>,
}

impl InMemoryCalendarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a doctor record with the given calendar.
    pub async fn insert_doctor(&self, doctor_id: &str, slots: AvailableSlots) {
        self.calendars.write().await.insert(doctor_id.to_string(), slots);
    }
}

#[async_trait]
impl CalendarStore for InMemoryCalendarStore {
    async fn load(&self, doctor_id: &str) -> Result<Option<AvailableSlots>> {
        Ok(self.calendars.read().await.get(doctor_id).cloned())
    }

    async fn save(&self, doctor_id: &str, slots: &AvailableSlots) -> Result<()> {
        // Upserts: a doctor's first calendar write registers them locally.
        self.calendars.write().await.insert(doctor_id.to_string(), slots.clone());
        Ok(())
    }
}
