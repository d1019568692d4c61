// libs/appointment-cell/src/services/store.rs
use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentStatus, PaymentRecord, PaymentStatus};

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: &Appointment) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>>;

    /// Removes a record. Only used to undo a booking whose calendar write failed.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Conditional status update: applies only while the stored status is
    /// still `from`. Returns `None` when the record is missing or has moved on.
    async fn transition(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Option<Appointment>>;

    /// Appointments where `user_id` is either the doctor or the patient,
    /// newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Appointment>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<PaymentRecord>>;

    async fn insert(&self, record: &PaymentRecord) -> Result<()>;

    /// Flips the record to `paid`. `None` when no record exists.
    async fn mark_paid(&self, appointment_id: Uuid) -> Result<Option<PaymentRecord>>;
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<()> {
        debug!("Inserting appointment {}", appointment.id);

        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            None,
            Some(json!(appointment)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if rows.is_empty() {
            return Err(anyhow!("appointment {} was not stored", appointment.id));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        self.supabase.execute(Method::DELETE, &path, None).await
    }

    async fn transition(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Option<Appointment>> {
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", id, from);
        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(json!({ "status": to })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        Ok(rows.into_iter().next())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Appointment>> {
        let encoded = urlencoding::encode(user_id);
        let path = format!(
            "/rest/v1/appointments?or=(doctor_id.eq.{},patient_id.eq.{})&order=date.desc",
            encoded, encoded
        );
        self.supabase.request(Method::GET, &path, None, None).await
    }
}

pub struct SupabasePaymentStore {
    supabase: SupabaseClient,
}

impl SupabasePaymentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl PaymentStore for SupabasePaymentStore {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<PaymentRecord>> {
        let path = format!("/rest/v1/payments?appointment_id=eq.{}", appointment_id);
        let rows: Vec<PaymentRecord> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, record: &PaymentRecord) -> Result<()> {
        let rows: Vec<PaymentRecord> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/payments",
            None,
            Some(json!(record)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if rows.is_empty() {
            return Err(anyhow!("payment for {} was not stored", record.appointment_id));
        }
        Ok(())
    }

    async fn mark_paid(&self, appointment_id: Uuid) -> Result<Option<PaymentRecord>> {
        let path = format!("/rest/v1/payments?appointment_id=eq.{}", appointment_id);
        let rows: Vec<PaymentRecord> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(json!({ "status": PaymentStatus::Paid })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        Ok(rows.into_iter().next())
    }
}

// ==============================================================================
// IN-PROCESS
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.appointments.read().await.is_empty()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<()> {
        let mut appointments = self.appointments.write().await;
        if appointments.contains_key(&appointment.id) {
            return Err(anyhow!("appointment {} already exists", appointment.id));
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.appointments.write().await.remove(&id);
        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Option<Appointment>> {
        let mut appointments = self.appointments.write().await;
        Ok(appointments
            .get_mut(&id)
            .filter(|appointment| appointment.status == from)
            .map(|appointment| {
                appointment.status = to;
                appointment.clone()
            }))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Appointment>> {
        let mut mine: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|appointment| appointment.is_participant(user_id))
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(mine)
    }
}

#[derive(Default)]
pub struct InMemoryPaymentStore {
    payments: RwLock<HashMap<Uuid, PaymentRecord>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<PaymentRecord>> {
        Ok(self.payments.read().await.get(&appointment_id).cloned())
    }

    async fn insert(&self, record: &PaymentRecord) -> Result<()> {
        let mut payments = self.payments.write().await;
        if payments.contains_key(&record.appointment_id) {
            return Err(anyhow!("payment for {} already exists", record.appointment_id));
        }
        payments.insert(record.appointment_id, record.clone());
        Ok(())
    }

    async fn mark_paid(&self, appointment_id: Uuid) -> Result<Option<PaymentRecord>> {
        let mut payments = self.payments.write().await;
        Ok(payments.get_mut(&appointment_id).map(|record| {
            record.status = PaymentStatus::Paid;
            record.clone()
        }))
    }
}
