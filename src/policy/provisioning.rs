// src/policy/provisioning.rs

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Profile, Role};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("only a super admin can manage user accounts")]
    NotSuperAdmin,
    #[error("email and password are required")]
    MissingFields,
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("role {0} cannot be assigned here")]
    RoleNotAssignable(Role),
    #[error("you cannot delete your own account")]
    SelfDeletion,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

/// A create request that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStaffAccount {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagedProfile {
    #[serde(flatten)]
    pub profile: Profile,
    pub deletable: bool,
}

/// Proof that the caller is a super admin. Every account operation starts by
/// building one, so a denied caller never reaches the backend.
#[derive(Debug, Clone, Copy)]
pub struct ProvisioningGate {
    caller: Uuid,
}

impl ProvisioningGate {
    pub fn for_caller(role: Role, user_id: Uuid) -> Result<Self, ProvisioningError> {
        if role == Role::SuperAdmin {
            Ok(Self { caller: user_id })
        } else {
            Err(ProvisioningError::NotSuperAdmin)
        }
    }

    /// Role defaults to admin. Customers sign themselves up elsewhere.
    pub fn validate_create(&self, req: &CreateUserRequest) -> Result<NewStaffAccount, ProvisioningError> {
        let email = req.email.trim();
        if email.is_empty() || req.password.is_empty() {
            return Err(ProvisioningError::MissingFields);
        }
        if !email.contains('@') {
            return Err(ProvisioningError::InvalidEmail);
        }
        let role = req.role.unwrap_or(Role::Admin);
        if !role.is_staff() {
            return Err(ProvisioningError::RoleNotAssignable(role));
        }
        Ok(NewStaffAccount {
            email: email.to_string(),
            password: req.password.clone(),
            role,
        })
    }

    pub fn is_deletable(&self, target: Uuid) -> bool {
        target != self.caller
    }

    pub fn ensure_deletable(&self, target: Uuid) -> Result<(), ProvisioningError> {
        if self.is_deletable(target) {
            Ok(())
        } else {
            Err(ProvisioningError::SelfDeletion)
        }
    }

    pub fn annotate(&self, profiles: Vec<Profile>) -> Vec<ManagedProfile> {
        profiles
            .into_iter()
            .map(|profile| ManagedProfile {
                deletable: self.is_deletable(profile.id),
                profile,
            })
            .collect()
    }
}
