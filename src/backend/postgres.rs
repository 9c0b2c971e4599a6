// src/backend/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    auth::{generate_access_token, hash_access_token, hash_password, verify_password},
    backend::{
        AppointmentFilter, AuthProvider, BackendError, NewAppointment, RecordStore, Session,
        SessionEvent,
    },
    models::{Appointment, AppointmentStatus, Profile, Role, Service},
};

const APPOINTMENT_COLUMNS: &str = r#"
    appointment_id, client_name, client_email, client_phone, client_address,
    service_id, appointment_date, appointment_time, duration_minutes,
    total_price_cents, status, notes, cancelled_at, cancellation_reason,
    user_id, created_at
"#;

const SERVICE_COLUMNS: &str =
    "service_id, name, description, duration_minutes, price_cents, is_active, created_at";

const EVENT_CAPACITY: usize = 256;

/// Postgres-backed auth service and record store.
#[derive(Clone)]
pub struct PgBackend {
    db: sqlx::PgPool,
    session_ttl_hours: i64,
    events: broadcast::Sender<SessionEvent>,
}

impl PgBackend {
    pub fn new(db: sqlx::PgPool, session_ttl_hours: i64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            db,
            session_ttl_hours,
            events,
        }
    }

    fn publish(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

fn db_err(e: sqlx::Error) -> BackendError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            BackendError::Conflict(db.message().to_string())
        }
        sqlx::Error::Database(db) => BackendError::Rejected(db.message().to_string()),
        _ => BackendError::Unavailable(Some(format!("db error: {e}"))),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    user_id: Uuid,
    password_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct SessionLookupRow {
    session_token_id: Uuid,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

#[async_trait]
impl AuthProvider for PgBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<(String, Session), BackendError> {
        let email = normalize_email(email);

        let user: CredentialRow = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT user_id, password_hash
            FROM app_user
            WHERE email = $1
            "#,
        )
        .bind(&email)
        .fetch_optional(&self.db)
        .await
        .map_err(db_err)?
        .ok_or(BackendError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(BackendError::InvalidCredentials);
        }

        let access_token = generate_access_token();
        let token_hash = hash_access_token(&access_token);
        let expires_at = Utc::now() + Duration::hours(self.session_ttl_hours);

        let session_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO session_token (user_id, session_token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING session_token_id
            "#,
        )
        .bind(user.user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await
        .map_err(db_err)?;

        self.publish(SessionEvent::SignedIn {
            session_id,
            user_id: user.user_id,
        });

        Ok((
            access_token,
            Session {
                session_id,
                user_id: user.user_id,
                expires_at,
            },
        ))
    }

    async fn get_session(&self, access_token: &str) -> Result<Option<Session>, BackendError> {
        let token_hash = hash_access_token(access_token);

        let row: Option<SessionLookupRow> = sqlx::query_as::<_, SessionLookupRow>(
            r#"
            SELECT st.session_token_id, st.user_id, st.expires_at
            FROM session_token st
            JOIN app_user u ON u.user_id = st.user_id
            WHERE st.session_token_hash = $1
              AND st.revoked_at IS NULL
              AND st.expires_at > now()
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        // Touch last_seen_at (best-effort)
        let _ = sqlx::query(
            r#"
            UPDATE session_token
            SET last_seen_at = now()
            WHERE session_token_id = $1
            "#,
        )
        .bind(row.session_token_id)
        .execute(&self.db)
        .await;

        Ok(Some(Session {
            session_id: row.session_token_id,
            user_id: row.user_id,
            expires_at: row.expires_at,
        }))
    }

    async fn sign_out(&self, session_id: Uuid) -> Result<(), BackendError> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE session_token
            SET revoked_at = now()
            WHERE session_token_id = $1
              AND revoked_at IS NULL
            RETURNING user_id
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.db)
        .await
        .map_err(db_err)?;

        if let Some(user_id) = user_id {
            self.publish(SessionEvent::SignedOut { session_id, user_id });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn create_user(&self, email: &str, password: &str, role: Role) -> Result<Uuid, BackendError> {
        let email = normalize_email(email);
        let pw_hash = hash_password(password).map_err(|e| BackendError::Unavailable(Some(e)))?;

        let mut tx = self.db.begin().await.map_err(db_err)?;

        let user_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO app_user (email, password_hash)
            VALUES ($1, $2)
            RETURNING user_id
            "#,
        )
        .bind(&email)
        .bind(&pw_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO profiles (id, email, role)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(&email)
        .bind(role)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(user_id)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), BackendError> {
        let mut tx = self.db.begin().await.map_err(db_err)?;

        let live_sessions: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT session_token_id
            FROM session_token
            WHERE user_id = $1
              AND revoked_at IS NULL
              AND expires_at > now()
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        // profiles and session_token cascade; appointments keep their rows with user_id nulled
        let res = sqlx::query(r#"DELETE FROM app_user WHERE user_id = $1"#)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(BackendError::Rejected("User not found".into()));
        }

        tx.commit().await.map_err(db_err)?;

        for session_id in live_sessions {
            self.publish(SessionEvent::SignedOut { session_id, user_id });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgBackend {
    async fn list_appointments(&self, filter: AppointmentFilter) -> Result<Vec<Appointment>, BackendError> {
        let sql = format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointments
            WHERE ($1::uuid IS NULL OR user_id = $1)
            ORDER BY appointment_date DESC, appointment_time DESC
            "#
        );

        sqlx::query_as::<_, Appointment>(&sql)
            .bind(filter.owner)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, BackendError> {
        let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE appointment_id = $1");

        sqlx::query_as::<_, Appointment>(&sql)
            .bind(appointment_id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, BackendError> {
        let sql = format!(
            r#"
            INSERT INTO appointments (
              client_name,
              client_email,
              client_phone,
              client_address,
              service_id,
              appointment_date,
              appointment_time,
              duration_minutes,
              total_price_cents,
              status,
              notes,
              user_id
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Appointment>(&sql)
            .bind(&new.client_name)
            .bind(&new.client_email)
            .bind(&new.client_phone)
            .bind(&new.client_address)
            .bind(new.service_id)
            .bind(new.appointment_date)
            .bind(new.appointment_time)
            .bind(new.duration_minutes)
            .bind(new.total_price)
            .bind(AppointmentStatus::Pending)
            .bind(new.notes.as_deref())
            .bind(new.user_id)
            .fetch_one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        at: DateTime<Utc>,
        reason: &str,
    ) -> Result<Option<Appointment>, BackendError> {
        let sql = format!(
            r#"
            UPDATE appointments
            SET status = $2,
                cancelled_at = $3,
                cancellation_reason = $4
            WHERE appointment_id = $1
              AND status <> $2
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Appointment>(&sql)
            .bind(appointment_id)
            .bind(AppointmentStatus::Cancelled)
            .bind(at)
            .bind(reason)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)
    }

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, BackendError> {
        let sql = format!(
            r#"
            UPDATE appointments
            SET status = $2
            WHERE appointment_id = $1
              AND status <> $3
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Appointment>(&sql)
            .bind(appointment_id)
            .bind(status)
            .bind(AppointmentStatus::Cancelled)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)
    }

    async fn list_services(&self, active_only: bool) -> Result<Vec<Service>, BackendError> {
        let sql = format!(
            r#"
            SELECT {SERVICE_COLUMNS}
            FROM services
            WHERE ($1 = false OR is_active = true)
            ORDER BY name ASC
            "#
        );

        sqlx::query_as::<_, Service>(&sql)
            .bind(active_only)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>, BackendError> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE service_id = $1");

        sqlx::query_as::<_, Service>(&sql)
            .bind(service_id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, BackendError> {
        sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, email, role, created_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(db_err)
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, BackendError> {
        sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, email, role, created_at
            FROM profiles
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(db_err)
    }

    async fn set_profile_role(&self, user_id: Uuid, role: Role) -> Result<Option<Profile>, BackendError> {
        sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET role = $2
            WHERE id = $1
            RETURNING id, email, role, created_at
            "#,
        )
        .bind(user_id)
        .bind(role)
        .fetch_optional(&self.db)
        .await
        .map_err(db_err)
    }
}
