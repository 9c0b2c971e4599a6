// src/policy/booking.rs

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::backend::NewAppointment;
use crate::models::Service;

/// Hourly start times offered to clients.
pub const FIRST_SLOT_HOUR: u32 = 9;
pub const LAST_SLOT_HOUR: u32 = 17;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("please fill in all required fields: {0}")]
    MissingFields(String),
    #[error("appointment_time must be HH:MM")]
    BadTime,
    #[error("appointments start on the hour between 09:00 and 17:00")]
    OutsideSlots,
    #[error("appointments can only be booked from tomorrow onwards")]
    DateNotBookable,
    #[error("we do not take appointments on Sundays")]
    Sunday,
    #[error("the selected service is not available")]
    ServiceUnavailable,
}

/// Booking form as submitted. Every field is optional on the wire so a
/// missing one reads as a validation error rather than a malformed body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BookingRequest {
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub client_address: String,
    pub service_id: Option<Uuid>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
    pub notes: Option<String>,
}

/// Field checks that need no backend data. Returns the chosen service id.
pub fn check_form(req: &BookingRequest) -> Result<Uuid, BookingError> {
    let mut missing = Vec::new();
    for (name, value) in [
        ("client_name", &req.client_name),
        ("client_email", &req.client_email),
        ("client_phone", &req.client_phone),
        ("client_address", &req.client_address),
    ] {
        if value.trim().is_empty() {
            missing.push(name);
        }
    }
    if req.service_id.is_none() {
        missing.push("service_id");
    }
    if req.appointment_date.is_none() {
        missing.push("appointment_date");
    }
    if req.appointment_time.as_deref().is_none_or(|t| t.trim().is_empty()) {
        missing.push("appointment_time");
    }
    if !missing.is_empty() {
        return Err(BookingError::MissingFields(missing.join(", ")));
    }
    req.service_id
        .ok_or_else(|| BookingError::MissingFields("service_id".into()))
}

pub fn parse_slot(raw: &str) -> Result<NaiveTime, BookingError> {
    let raw = raw.trim();
    let time = NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| BookingError::BadTime)?;
    let on_the_hour = time.minute() == 0 && time.second() == 0;
    if !on_the_hour || !(FIRST_SLOT_HOUR..=LAST_SLOT_HOUR).contains(&time.hour()) {
        return Err(BookingError::OutsideSlots);
    }
    Ok(time)
}

/// Builds the row to insert. Price and duration are copied from the service
/// now and never re-derived.
pub fn build_appointment(
    req: BookingRequest,
    service: Option<&Service>,
    owner: Option<Uuid>,
    today: NaiveDate,
) -> Result<NewAppointment, BookingError> {
    let service_id = check_form(&req)?;
    let date = req
        .appointment_date
        .ok_or_else(|| BookingError::MissingFields("appointment_date".into()))?;
    let time = parse_slot(req.appointment_time.as_deref().unwrap_or_default())?;

    if date <= today {
        return Err(BookingError::DateNotBookable);
    }
    if date.weekday() == Weekday::Sun {
        return Err(BookingError::Sunday);
    }

    let service = service
        .filter(|s| s.service_id == service_id && s.is_active)
        .ok_or(BookingError::ServiceUnavailable)?;

    Ok(NewAppointment {
        client_name: req.client_name.trim().to_string(),
        client_email: req.client_email.trim().to_string(),
        client_phone: req.client_phone.trim().to_string(),
        client_address: req.client_address.trim().to_string(),
        service_id,
        appointment_date: date,
        appointment_time: time,
        duration_minutes: service.duration_minutes,
        total_price: service.price,
        notes: req.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        user_id: owner,
    })
}
