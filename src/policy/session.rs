// src/policy/session.rs

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::backend::Session;
use crate::models::{Profile, Role};

/// Top-level views a caller can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Unauthenticated,
    CustomerDashboard,
    AdminDashboard,
    SuperAdminDashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDecision {
    Stay,
    Redirect(View),
}

impl ViewDecision {
    /// The view the caller ends up on.
    pub fn target(self, requested: View) -> View {
        match self {
            ViewDecision::Stay => requested,
            ViewDecision::Redirect(v) => v,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("no profile found for user {0}")]
    MissingProfile(Uuid),
}

/// Where a signed-in role lands from a generic entry point.
pub fn landing_for(role: Role) -> View {
    match role {
        Role::Customer => View::CustomerDashboard,
        Role::Admin => View::AdminDashboard,
        Role::SuperAdmin => View::SuperAdminDashboard,
    }
}

/// Resolves the landing view for a caller. A session without a profile is an
/// access error, never a default role.
pub fn resolve_landing(session: Option<&Session>, profile: Option<&Profile>) -> Result<View, AccessError> {
    let Some(session) = session else {
        return Ok(View::Unauthenticated);
    };
    match profile {
        Some(p) if p.id == session.user_id => Ok(landing_for(p.role)),
        _ => Err(AccessError::MissingProfile(session.user_id)),
    }
}

/// Single redirect policy for every entry point.
///
/// `role` is `None` when there is no session.
pub fn authorize_view(requested: View, role: Option<Role>) -> ViewDecision {
    let Some(role) = role else {
        return match requested {
            View::Unauthenticated => ViewDecision::Stay,
            _ => ViewDecision::Redirect(View::Unauthenticated),
        };
    };

    let allowed = match requested {
        View::Unauthenticated => false,
        View::CustomerDashboard => role == Role::Customer,
        View::AdminDashboard => role.is_staff(),
        View::SuperAdminDashboard => role == Role::SuperAdmin,
    };

    if allowed {
        ViewDecision::Stay
    } else {
        ViewDecision::Redirect(landing_for(role))
    }
}
