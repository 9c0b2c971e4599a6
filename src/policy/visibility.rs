use uuid::Uuid;

use crate::backend::AppointmentFilter;
use crate::models::{Appointment, Role};

/// Which appointments a caller may list or open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityScope {
    Own(Uuid),
    All,
}

impl VisibilityScope {
    pub fn for_role(role: Role, user_id: Uuid) -> Self {
        if role.is_staff() {
            VisibilityScope::All
        } else {
            VisibilityScope::Own(user_id)
        }
    }

    /// Filter pushed down to the record store.
    pub fn filter(self) -> AppointmentFilter {
        match self {
            VisibilityScope::Own(user_id) => AppointmentFilter { owner: Some(user_id) },
            VisibilityScope::All => AppointmentFilter { owner: None },
        }
    }

    pub fn permits(self, appointment: &Appointment) -> bool {
        match self {
            VisibilityScope::Own(user_id) => appointment.user_id == Some(user_id),
            VisibilityScope::All => true,
        }
    }

    /// Drops rows outside the scope and orders the rest newest first.
    /// The store already filters; rows are re-checked here regardless.
    pub fn apply(self, rows: Vec<Appointment>) -> Vec<Appointment> {
        let mut visible: Vec<Appointment> = rows.into_iter().filter(|a| self.permits(a)).collect();
        sort_newest_first(&mut visible);
        visible
    }
}

/// Date descending, then time descending.
pub fn sort_newest_first(rows: &mut [Appointment]) {
    rows.sort_by(|a, b| {
        b.appointment_date
            .cmp(&a.appointment_date)
            .then_with(|| b.appointment_time.cmp(&a.appointment_time))
    });
}
