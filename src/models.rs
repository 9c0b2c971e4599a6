use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use uuid::Uuid;

use crate::backend::{AuthProvider, RecordStore};
use crate::calendar::CalendarConfig;
use crate::middleware::in_flight::InFlight;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthProvider>,
    pub store: Arc<dyn RecordStore>,
    pub calendar: CalendarConfig,
    pub in_flight: InFlight,
}

/* -------------------------
   Enumerations
--------------------------*/

/// Role stored on the profile row. Governs visibility and permitted actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Admin and super_admin both see every appointment and may correct past records.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* -------------------------
   Money
--------------------------*/

/// Amount in minor currency units. Sums stay exact; rendering is two-decimal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, sqlx::Type)]
#[sqlx(transparent)]
pub struct Money(pub i64);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::default(), |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub client_address: String,
    pub service_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub duration_minutes: i32,
    #[sqlx(rename = "total_price_cents")]
    pub total_price: Money,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// Local wall-clock start. The stored time carries no zone.
    pub fn starts_at(&self) -> NaiveDateTime {
        self.appointment_date.and_time(self.appointment_time)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == AppointmentStatus::Cancelled
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Service {
    pub service_id: Uuid,
    pub name: String,
    pub description: String,
    pub duration_minutes: i32,
    #[sqlx(rename = "price_cents")]
    pub price: Money,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_renders_two_decimals() {
        assert_eq!(Money::from_cents(7000).to_string(), "70.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1250).to_string(), "-12.50");
    }

    #[test]
    fn money_sum_is_exact() {
        let total: Money = [10, 20, 1].into_iter().map(Money::from_cents).sum();
        assert_eq!(total, Money::from_cents(31));
        assert_eq!(serde_json::to_string(&total).unwrap(), "\"0.31\"");
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::SuperAdmin).unwrap(), "\"super_admin\"");
        let r: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(r, Role::Admin);
        assert!(Role::Admin.is_staff());
        assert!(!Role::Customer.is_staff());
    }
}
