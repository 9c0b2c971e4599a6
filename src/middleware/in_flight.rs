use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::error::ApiError;

/// Appointments with a mutation currently outstanding.
#[derive(Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<Uuid>>>,
}

/// Releases the appointment when dropped, whether the action succeeded or not.
#[must_use]
pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<Uuid>>>,
    id: Uuid,
}

impl InFlight {
    pub fn begin(&self, appointment_id: Uuid) -> Result<InFlightGuard, ApiError> {
        let mut ids = self.ids.lock().unwrap_or_else(|p| p.into_inner());
        if !ids.insert(appointment_id) {
            return Err(ApiError::Conflict(
                "ACTION_IN_PROGRESS",
                "Another change to this appointment is still in progress".into(),
            ));
        }
        Ok(InFlightGuard {
            ids: self.ids.clone(),
            id: appointment_id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.id);
    }
}
