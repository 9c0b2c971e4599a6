use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Appointment, AppointmentStatus, Money};

/// Display statistics over the appointments a viewer was shown.
/// Recomputed from the list on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_count: usize,
    pub pending_count: usize,
    pub upcoming_count: usize,
    pub completed_revenue: Money,
    pub unique_client_count: usize,
}

impl Summary {
    pub fn compute(appointments: &[Appointment], today: NaiveDate) -> Self {
        let completed_revenue: Money = appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Completed)
            .map(|a| a.total_price)
            .sum();

        // emails compare case-insensitively, ignoring surrounding whitespace
        let unique_client_count = appointments
            .iter()
            .map(|a| a.client_email.trim().to_lowercase())
            .collect::<HashSet<_>>()
            .len();

        Summary {
            total_count: appointments.len(),
            pending_count: appointments
                .iter()
                .filter(|a| a.status == AppointmentStatus::Pending)
                .count(),
            upcoming_count: appointments
                .iter()
                .filter(|a| a.appointment_date >= today && !a.is_cancelled())
                .count(),
            completed_revenue,
            unique_client_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn appt(price_cents: i64, status: AppointmentStatus, email: &str, date: NaiveDate) -> Appointment {
        Appointment {
            appointment_id: Uuid::new_v4(),
            client_name: "C".into(),
            client_email: email.into(),
            client_phone: "1".into(),
            client_address: "A".into(),
            service_id: Uuid::new_v4(),
            appointment_date: date,
            appointment_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            duration_minutes: 60,
            total_price: Money::from_cents(price_cents),
            status,
            notes: None,
            cancelled_at: None,
            cancellation_reason: None,
            user_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn revenue_counts_completed_only() {
        let rows = vec![
            appt(5000, AppointmentStatus::Completed, "a@x", today()),
            appt(3000, AppointmentStatus::Pending, "a@x", today()),
            appt(2000, AppointmentStatus::Completed, "b@x", today()),
        ];
        let s = Summary::compute(&rows, today());
        assert_eq!(s.completed_revenue, Money::from_cents(7000));
        assert_eq!(s.completed_revenue.to_string(), "70.00");
        assert_eq!(s.pending_count, 1);
        assert_eq!(s.total_count, 3);
    }

    #[test]
    fn cents_do_not_drift() {
        let rows: Vec<_> = (0..10)
            .map(|_| appt(10, AppointmentStatus::Completed, "a@x", today()))
            .collect();
        assert_eq!(Summary::compute(&rows, today()).completed_revenue.to_string(), "1.00");
    }

    #[test]
    fn unique_clients_by_email() {
        let rows = vec![
            appt(0, AppointmentStatus::Pending, "a@x", today()),
            appt(0, AppointmentStatus::Pending, "a@x", today()),
            appt(0, AppointmentStatus::Pending, "b@x", today()),
        ];
        assert_eq!(Summary::compute(&rows, today()).unique_client_count, 2);

        let rows = vec![
            appt(0, AppointmentStatus::Pending, "A@x ", today()),
            appt(0, AppointmentStatus::Pending, "a@x", today()),
        ];
        assert_eq!(Summary::compute(&rows, today()).unique_client_count, 1);
    }

    #[test]
    fn upcoming_skips_past_and_cancelled() {
        let yesterday = today().pred_opt().unwrap();
        let tomorrow = today().succ_opt().unwrap();
        let rows = vec![
            appt(0, AppointmentStatus::Pending, "a@x", yesterday),
            appt(0, AppointmentStatus::Confirmed, "a@x", today()),
            appt(0, AppointmentStatus::Cancelled, "a@x", tomorrow),
            appt(0, AppointmentStatus::Pending, "a@x", tomorrow),
        ];
        assert_eq!(Summary::compute(&rows, today()).upcoming_count, 2);
    }

    #[test]
    fn empty_list_is_all_zero() {
        let s = Summary::compute(&[], today());
        assert_eq!(s.total_count, 0);
        assert_eq!(s.unique_client_count, 0);
        assert_eq!(s.completed_revenue, Money::default());
    }
}
