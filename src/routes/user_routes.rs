// src/routes/user_routes.rs

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, OkData, Profile},
    policy::provisioning::{CreateUserRequest, ManagedProfile, ProvisioningGate},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{user_id}", delete(delete_user))
}

/* ============================================================
   GET /users (super admin)
   ============================================================ */

pub async fn list_users(
    State(state): State<AppState>,
    mut auth: AuthContext,
) -> Result<Json<ApiOk<Vec<ManagedProfile>>>, ApiError> {
    let gate = ProvisioningGate::for_caller(auth.role, auth.user_id)?;

    let profiles = state.store.list_profiles().await?;
    auth.ensure_live().await?;

    Ok(Json(ApiOk {
        data: gate.annotate(profiles),
    }))
}

/* ============================================================
   POST /users (super admin)
   ============================================================ */

pub async fn create_user(
    State(state): State<AppState>,
    mut auth: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiOk<Profile>>, ApiError> {
    let gate = ProvisioningGate::for_caller(auth.role, auth.user_id)?;
    let account = gate.validate_create(&req)?;

    let user_id = state
        .auth
        .create_user(&account.email, &account.password, account.role)
        .await?;
    let profile = state
        .store
        .get_profile(user_id)
        .await?
        .ok_or_else(|| ApiError::Internal("profile missing after user creation".into()))?;
    auth.ensure_live().await?;

    tracing::info!(
        created_by = %auth.user_id,
        user_id = %user_id,
        role = %account.role,
        "user created"
    );

    Ok(Json(ApiOk { data: profile }))
}

/* ============================================================
   DELETE /users/{id} (super admin)
   ============================================================ */

pub async fn delete_user(
    State(state): State<AppState>,
    mut auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let gate = ProvisioningGate::for_caller(auth.role, auth.user_id)?;
    gate.ensure_deletable(user_id)?;

    state.auth.delete_user(user_id).await?;
    auth.ensure_live().await?;

    tracing::info!(deleted_by = %auth.user_id, user_id = %user_id, "user deleted");

    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}
