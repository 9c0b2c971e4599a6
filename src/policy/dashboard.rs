use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Appointment, Role};
use crate::policy::{
    lifecycle::can_cancel,
    session::{View, landing_for},
    summary::Summary,
    visibility::VisibilityScope,
};

/// One dashboard for every role; the role only changes the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardPolicy {
    pub role: Role,
    pub view: View,
    pub scope: VisibilityScope,
    pub manages_users: bool,
}

impl DashboardPolicy {
    pub fn for_role(role: Role, user_id: Uuid) -> Self {
        Self {
            role,
            view: landing_for(role),
            scope: VisibilityScope::for_role(role, user_id),
            manages_users: role == Role::SuperAdmin,
        }
    }

    pub fn render(&self, rows: Vec<Appointment>, now: NaiveDateTime, today: NaiveDate) -> Dashboard {
        let visible = self.scope.apply(rows);
        // figures cover exactly the rows the caller can see
        let summary = Summary::compute(&visible, today);
        let appointments = visible
            .into_iter()
            .map(|appointment| AppointmentView {
                can_cancel: can_cancel(&appointment, self.role, now),
                appointment,
            })
            .collect::<Vec<_>>();

        Dashboard {
            view: self.view,
            empty: appointments.is_empty(),
            appointments,
            summary,
            manages_users: self.manages_users,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub can_cancel: bool,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub view: View,
    pub appointments: Vec<AppointmentView>,
    /// No appointments is a normal state, not an error.
    pub empty: bool,
    pub summary: Summary,
    pub manages_users: bool,
}
