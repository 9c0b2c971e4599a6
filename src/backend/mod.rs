//! External capabilities the server is built on: an auth service and a record store.
//!
//! Handlers only ever see the traits. `postgres` is the production backend;
//! `memory` backs the router tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, Money, Profile, Role, Service};

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid email or password")]
    InvalidCredentials,
    /// The backend refused the request (constraint, bad input). Carries its message.
    #[error("{0}")]
    Rejected(String),
    /// A uniqueness rule was violated, e.g. a duplicate email.
    #[error("{0}")]
    Conflict(String),
    /// Network or storage failure. The message is optional.
    #[error("backend unavailable")]
    Unavailable(Option<String>),
}

/// A live authenticated session as reported by the auth capability.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { session_id: Uuid, user_id: Uuid },
    SignedOut { session_id: Uuid, user_id: Uuid },
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Exchange credentials for an opaque access token.
    async fn sign_in(&self, email: &str, password: &str) -> Result<(String, Session), BackendError>;

    /// Resolve an access token. `None` when unknown, revoked or expired.
    async fn get_session(&self, access_token: &str) -> Result<Option<Session>, BackendError>;

    async fn sign_out(&self, session_id: Uuid) -> Result<(), BackendError>;

    /// Sign-in and sign-out notifications, including sessions ended by user deletion.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    /// Creates the identity and its profile with `role` in one step; on error
    /// nothing is left behind.
    async fn create_user(&self, email: &str, password: &str, role: Role) -> Result<Uuid, BackendError>;

    async fn delete_user(&self, user_id: Uuid) -> Result<(), BackendError>;
}

/// Which appointments a list query may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppointmentFilter {
    pub owner: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub client_address: String,
    pub service_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub duration_minutes: i32,
    pub total_price: Money,
    pub notes: Option<String>,
    pub user_id: Option<Uuid>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Ordered by appointment date, then time, both descending.
    async fn list_appointments(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, BackendError>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, BackendError>;

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, BackendError>;

    /// Sets status, `cancelled_at` and `cancellation_reason` in one update.
    /// Returns `None` when the row is missing or already cancelled.
    async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        at: DateTime<Utc>,
        reason: &str,
    ) -> Result<Option<Appointment>, BackendError>;

    /// Returns `None` when the row is missing or already cancelled.
    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, BackendError>;

    async fn list_services(&self, active_only: bool) -> Result<Vec<Service>, BackendError>;

    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>, BackendError>;

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, BackendError>;

    /// Newest first.
    async fn list_profiles(&self) -> Result<Vec<Profile>, BackendError>;

    async fn set_profile_role(&self, user_id: Uuid, role: Role) -> Result<Option<Profile>, BackendError>;
}
