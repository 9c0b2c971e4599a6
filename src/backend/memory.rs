//! In-process backend for tests. Same contract as the Postgres one.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::generate_access_token;
use crate::backend::{
    AppointmentFilter, AuthProvider, BackendError, NewAppointment, RecordStore, Session,
    SessionEvent,
};
use crate::models::{Appointment, AppointmentStatus, Money, Profile, Role, Service};

#[derive(Default)]
struct Inner {
    credentials: HashMap<String, (Uuid, String)>,
    sessions: HashMap<String, Session>,
    profiles: HashMap<Uuid, Profile>,
    services: Vec<Service>,
    appointments: Vec<Appointment>,
}

pub struct MemoryBackend {
    inner: Mutex<Inner>,
    events: broadcast::Sender<SessionEvent>,
    /// create_user + delete_user invocations.
    pub provisioning_calls: AtomicUsize,
    /// Makes every mutating call fail with `Unavailable`.
    pub fail_writes: AtomicBool,
    /// Makes only `set_profile_role` fail.
    pub fail_role_updates: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Mutex::new(Inner::default()),
            events,
            provisioning_calls: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            fail_role_updates: AtomicBool::new(false),
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl MemoryBackend {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn check_writable(&self) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(BackendError::Unavailable(None))
        } else {
            Ok(())
        }
    }

    /// Registers an identity with a profile and a live session; returns (user_id, token).
    pub fn seed_user(&self, email: &str, role: Role) -> (Uuid, String) {
        let user_id = Uuid::new_v4();
        let token = generate_access_token();
        let mut inner = self.lock();
        inner
            .credentials
            .insert(normalize_email(email), (user_id, "password123".to_string()));
        inner.profiles.insert(
            user_id,
            Profile {
                id: user_id,
                email: normalize_email(email),
                role,
                created_at: Utc::now(),
            },
        );
        inner.sessions.insert(
            token.clone(),
            Session {
                session_id: Uuid::new_v4(),
                user_id,
                expires_at: Utc::now() + Duration::hours(1),
            },
        );
        (user_id, token)
    }

    /// A live session whose identity has no profile row.
    pub fn seed_session_without_profile(&self) -> String {
        let token = generate_access_token();
        self.lock().sessions.insert(
            token.clone(),
            Session {
                session_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                expires_at: Utc::now() + Duration::hours(1),
            },
        );
        token
    }

    pub fn seed_service(&self, name: &str, price_cents: i64, duration_minutes: i32, is_active: bool) -> Service {
        let service = Service {
            service_id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{name} description"),
            duration_minutes,
            price: Money::from_cents(price_cents),
            is_active,
            created_at: Utc::now(),
        };
        self.lock().services.push(service.clone());
        service
    }

    pub fn seed_appointment(
        &self,
        owner: Option<Uuid>,
        email: &str,
        date: NaiveDate,
        time: NaiveTime,
        status: AppointmentStatus,
        price_cents: i64,
    ) -> Appointment {
        let appointment = Appointment {
            appointment_id: Uuid::new_v4(),
            client_name: "Test Client".into(),
            client_email: email.to_string(),
            client_phone: "555-0100".into(),
            client_address: "1 Main St".into(),
            service_id: Uuid::new_v4(),
            appointment_date: date,
            appointment_time: time,
            duration_minutes: 60,
            total_price: Money::from_cents(price_cents),
            status,
            notes: None,
            cancelled_at: None,
            cancellation_reason: None,
            user_id: owner,
            created_at: Utc::now(),
        };
        self.lock().appointments.push(appointment.clone());
        appointment
    }

    pub fn appointment(&self, appointment_id: Uuid) -> Option<Appointment> {
        self.lock()
            .appointments
            .iter()
            .find(|a| a.appointment_id == appointment_id)
            .cloned()
    }

    pub fn profile_count(&self) -> usize {
        self.lock().profiles.len()
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<(String, Session), BackendError> {
        let mut inner = self.lock();
        let (user_id, stored) = inner
            .credentials
            .get(&normalize_email(email))
            .cloned()
            .ok_or(BackendError::InvalidCredentials)?;
        if stored != password {
            return Err(BackendError::InvalidCredentials);
        }
        let token = generate_access_token();
        let session = Session {
            session_id: Uuid::new_v4(),
            user_id,
            expires_at: Utc::now() + Duration::hours(1),
        };
        inner.sessions.insert(token.clone(), session.clone());
        let _ = self.events.send(SessionEvent::SignedIn {
            session_id: session.session_id,
            user_id,
        });
        Ok((token, session))
    }

    async fn get_session(&self, access_token: &str) -> Result<Option<Session>, BackendError> {
        Ok(self
            .lock()
            .sessions
            .get(access_token)
            .filter(|s| s.expires_at > Utc::now())
            .cloned())
    }

    async fn sign_out(&self, session_id: Uuid) -> Result<(), BackendError> {
        let mut inner = self.lock();
        let ended: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| s.session_id == session_id)
            .cloned()
            .collect();
        inner.sessions.retain(|_, s| s.session_id != session_id);
        for s in ended {
            let _ = self.events.send(SessionEvent::SignedOut {
                session_id: s.session_id,
                user_id: s.user_id,
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn create_user(&self, email: &str, password: &str, role: Role) -> Result<Uuid, BackendError> {
        self.provisioning_calls.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        let email = normalize_email(email);
        let mut inner = self.lock();
        if inner.credentials.contains_key(&email) {
            return Err(BackendError::Conflict(
                "A user with this email address has already been registered".into(),
            ));
        }
        let user_id = Uuid::new_v4();
        inner
            .credentials
            .insert(email.clone(), (user_id, password.to_string()));
        inner.profiles.insert(
            user_id,
            Profile {
                id: user_id,
                email,
                role,
                created_at: Utc::now(),
            },
        );
        Ok(user_id)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), BackendError> {
        self.provisioning_calls.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        let mut inner = self.lock();
        if inner.profiles.remove(&user_id).is_none() {
            return Err(BackendError::Rejected("User not found".into()));
        }
        inner.credentials.retain(|_, (id, _)| *id != user_id);
        let ended: Vec<Uuid> = inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.session_id)
            .collect();
        inner.sessions.retain(|_, s| s.user_id != user_id);
        for a in inner.appointments.iter_mut().filter(|a| a.user_id == Some(user_id)) {
            a.user_id = None;
        }
        for session_id in ended {
            let _ = self.events.send(SessionEvent::SignedOut { session_id, user_id });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryBackend {
    async fn list_appointments(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, BackendError> {
        let mut rows: Vec<Appointment> = self
            .lock()
            .appointments
            .iter()
            .filter(|a| filter.owner.is_none() || a.user_id == filter.owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.starts_at().cmp(&a.starts_at()));
        Ok(rows)
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, BackendError> {
        Ok(self.appointment(appointment_id))
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, BackendError> {
        self.check_writable()?;
        let appointment = Appointment {
            appointment_id: Uuid::new_v4(),
            client_name: new.client_name,
            client_email: new.client_email,
            client_phone: new.client_phone,
            client_address: new.client_address,
            service_id: new.service_id,
            appointment_date: new.appointment_date,
            appointment_time: new.appointment_time,
            duration_minutes: new.duration_minutes,
            total_price: new.total_price,
            status: AppointmentStatus::Pending,
            notes: new.notes,
            cancelled_at: None,
            cancellation_reason: None,
            user_id: new.user_id,
            created_at: Utc::now(),
        };
        self.lock().appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        at: DateTime<Utc>,
        reason: &str,
    ) -> Result<Option<Appointment>, BackendError> {
        self.check_writable()?;
        let mut inner = self.lock();
        let Some(row) = inner
            .appointments
            .iter_mut()
            .find(|a| a.appointment_id == appointment_id && !a.is_cancelled())
        else {
            return Ok(None);
        };
        row.status = AppointmentStatus::Cancelled;
        row.cancelled_at = Some(at);
        row.cancellation_reason = Some(reason.to_string());
        Ok(Some(row.clone()))
    }

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, BackendError> {
        self.check_writable()?;
        let mut inner = self.lock();
        let Some(row) = inner
            .appointments
            .iter_mut()
            .find(|a| a.appointment_id == appointment_id && !a.is_cancelled())
        else {
            return Ok(None);
        };
        row.status = status;
        Ok(Some(row.clone()))
    }

    async fn list_services(&self, active_only: bool) -> Result<Vec<Service>, BackendError> {
        let mut rows: Vec<Service> = self
            .lock()
            .services
            .iter()
            .filter(|s| !active_only || s.is_active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>, BackendError> {
        Ok(self
            .lock()
            .services
            .iter()
            .find(|s| s.service_id == service_id)
            .cloned())
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, BackendError> {
        Ok(self.lock().profiles.get(&user_id).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, BackendError> {
        let mut rows: Vec<Profile> = self.lock().profiles.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn set_profile_role(&self, user_id: Uuid, role: Role) -> Result<Option<Profile>, BackendError> {
        self.check_writable()?;
        if self.fail_role_updates.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable(None));
        }
        let mut inner = self.lock();
        Ok(inner.profiles.get_mut(&user_id).map(|p| {
            p.role = role;
            p.clone()
        }))
    }
}
