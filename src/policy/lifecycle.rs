// src/policy/lifecycle.rs

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use crate::models::{Appointment, AppointmentStatus, Role};

pub const DEFAULT_CANCELLATION_REASON: &str = "No reason provided";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("appointment is already cancelled")]
    AlreadyCancelled,
    #[error("past appointments can only be cancelled by staff")]
    InPast,
    #[error("cancelled appointments cannot change status")]
    Terminal,
    #[error("use the cancel action to cancel an appointment")]
    UseCancelAction,
}

/// Fields written together when an appointment is cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// Cancelled rows are terminal. Upcoming rows (start >= now) may be cancelled
/// by anyone who can see them; past rows only by staff.
pub fn can_cancel(appointment: &Appointment, role: Role, now: NaiveDateTime) -> bool {
    if appointment.is_cancelled() {
        return false;
    }
    appointment.starts_at() >= now || role.is_staff()
}

pub fn normalize_reason(reason: Option<&str>) -> String {
    match reason.map(str::trim) {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => DEFAULT_CANCELLATION_REASON.to_string(),
    }
}

/// `now_local` is compared against the appointment's wall-clock start;
/// `now_utc` becomes the stored cancellation timestamp.
pub fn plan_cancellation(
    appointment: &Appointment,
    role: Role,
    now_local: NaiveDateTime,
    now_utc: DateTime<Utc>,
    reason: Option<&str>,
) -> Result<Cancellation, LifecycleError> {
    if appointment.is_cancelled() {
        return Err(LifecycleError::AlreadyCancelled);
    }
    if !can_cancel(appointment, role, now_local) {
        return Err(LifecycleError::InPast);
    }
    Ok(Cancellation {
        at: now_utc,
        reason: normalize_reason(reason),
    })
}

/// Administrative status edits. Cancellation has its own action because it
/// carries a timestamp and a reason.
pub fn check_status_change(appointment: &Appointment, target: AppointmentStatus) -> Result<(), LifecycleError> {
    if appointment.is_cancelled() {
        return Err(LifecycleError::Terminal);
    }
    if target == AppointmentStatus::Cancelled {
        return Err(LifecycleError::UseCancelAction);
    }
    Ok(())
}
