//! iCalendar (RFC 5545) export of a single appointment.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::models::{Appointment, AppointmentStatus};

const EVENT_LENGTH_MINUTES: i64 = 60;
const MAX_LINE_OCTETS: usize = 75;
const DEFAULT_SUMMARY: &str = "Massage Appointment";
const DEFAULT_DESCRIPTION: &str = "Scheduled massage appointment";

#[derive(Debug, Clone)]
pub struct CalendarConfig {
    /// Right-hand side of every event UID.
    pub domain: String,
    pub prodid: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcsEvent {
    pub uid: String,
    pub stamp: DateTime<Utc>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub status: &'static str,
}

impl IcsEvent {
    /// Fixed one-hour block from the appointment start. `DTSTAMP` is the
    /// appointment's creation time, so the same row always exports the same bytes.
    pub fn from_appointment(appointment: &Appointment, service_name: Option<&str>, cfg: &CalendarConfig) -> Self {
        let start = appointment.starts_at();
        let description = appointment
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION);

        Self {
            uid: format!("{}@{}", appointment.appointment_id, cfg.domain),
            stamp: appointment.created_at,
            start,
            end: start + Duration::minutes(EVENT_LENGTH_MINUTES),
            summary: service_name.unwrap_or(DEFAULT_SUMMARY).to_string(),
            description: description.to_string(),
            location: appointment.client_address.clone(),
            status: match appointment.status {
                AppointmentStatus::Pending => "TENTATIVE",
                AppointmentStatus::Cancelled => "CANCELLED",
                AppointmentStatus::Confirmed | AppointmentStatus::Completed => "CONFIRMED",
            },
        }
    }

    pub fn to_ics(&self, cfg: &CalendarConfig) -> String {
        // appointment times carry no zone, so start/end are floating local times
        let lines = [
            "BEGIN:VCALENDAR".to_string(),
            "VERSION:2.0".to_string(),
            format!("PRODID:{}", cfg.prodid),
            "CALSCALE:GREGORIAN".to_string(),
            "METHOD:PUBLISH".to_string(),
            "BEGIN:VEVENT".to_string(),
            format!("UID:{}", self.uid),
            format!("DTSTAMP:{}", self.stamp.format("%Y%m%dT%H%M%SZ")),
            format!("DTSTART:{}", self.start.format("%Y%m%dT%H%M%S")),
            format!("DTEND:{}", self.end.format("%Y%m%dT%H%M%S")),
            format!("SUMMARY:{}", escape_text(&self.summary)),
            format!("DESCRIPTION:{}", escape_text(&self.description)),
            format!("LOCATION:{}", escape_text(&self.location)),
            format!("STATUS:{}", self.status),
            "END:VEVENT".to_string(),
            "END:VCALENDAR".to_string(),
        ];

        let mut out = String::new();
        for line in &lines {
            fold_into(&mut out, line);
        }
        out
    }
}

pub fn export_filename(appointment: &Appointment) -> String {
    format!("appointment-{}.ics", appointment.appointment_date.format("%Y-%m-%d"))
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Appends `line` with CRLF, folding at 75 octets without splitting a UTF-8 sequence.
fn fold_into(out: &mut String, line: &str) {
    let mut budget = MAX_LINE_OCTETS;
    let mut used = 0;
    for ch in line.chars() {
        let len = ch.len_utf8();
        if used + len > budget {
            out.push_str("\r\n ");
            // the leading space counts toward the next line
            budget = MAX_LINE_OCTETS - 1;
            used = 0;
        }
        out.push(ch);
        used += len;
    }
    out.push_str("\r\n");
}
