// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{Local, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    calendar::{IcsEvent, export_filename},
    error::ApiError,
    middleware::auth_context::{AuthContext, MaybeAuth},
    models::{ApiOk, AppState, Appointment, AppointmentStatus},
    policy::{
        booking::{BookingRequest, build_appointment, check_form},
        dashboard::AppointmentView,
        lifecycle::{LifecycleError, can_cancel, check_status_change, plan_cancellation},
        visibility::VisibilityScope,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route("/{appointment_id}", get(get_appointment))
        .route("/{appointment_id}/cancel", post(cancel_appointment))
        .route("/{appointment_id}/status", patch(update_status))
        .route("/{appointment_id}/calendar.ics", get(export_calendar))
}

/// Loads a row the caller is allowed to see. Rows outside the caller's scope
/// read as missing.
async fn load_visible(
    state: &AppState,
    auth: &AuthContext,
    appointment_id: Uuid,
) -> Result<Appointment, ApiError> {
    let scope = VisibilityScope::for_role(auth.role, auth.user_id);
    state
        .store
        .get_appointment(appointment_id)
        .await?
        .filter(|a| scope.permits(a))
        .ok_or_else(ApiError::appointment_not_found)
}

fn view_for(appointment: Appointment, auth: &AuthContext) -> AppointmentView {
    AppointmentView {
        can_cancel: can_cancel(&appointment, auth.role, Local::now().naive_local()),
        appointment,
    }
}

/* ============================================================
   GET /appointments
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
    mut auth: AuthContext,
) -> Result<Json<ApiOk<Vec<AppointmentView>>>, ApiError> {
    let scope = VisibilityScope::for_role(auth.role, auth.user_id);
    let rows = state.store.list_appointments(scope.filter()).await?;
    auth.ensure_live().await?;

    let data = scope
        .apply(rows)
        .into_iter()
        .map(|a| view_for(a, &auth))
        .collect();

    Ok(Json(ApiOk { data }))
}

/* ============================================================
   GET /appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    mut auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    let appointment = load_visible(&state, &auth, appointment_id).await?;
    auth.ensure_live().await?;

    Ok(Json(ApiOk {
        data: view_for(appointment, &auth),
    }))
}

/* ============================================================
   POST /appointments (booking form)
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    MaybeAuth(auth): MaybeAuth,
    Json(req): Json<BookingRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    // reject incomplete forms before any backend call
    let service_id = check_form(&req)?;

    let service = state.store.get_service(service_id).await?;
    let owner = auth.as_ref().map(|a| a.user_id);
    let new = build_appointment(req, service.as_ref(), owner, Local::now().date_naive())?;

    let created = state.store.insert_appointment(new).await?;
    if let Some(mut auth) = auth {
        auth.ensure_live().await?;
    }

    tracing::info!(
        appointment_id = %created.appointment_id,
        service_id = %created.service_id,
        date = %created.appointment_date,
        "appointment booked"
    );

    Ok(Json(ApiOk { data: created }))
}

/* ============================================================
   POST /appointments/{id}/cancel
   ============================================================ */

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    mut auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let _guard = state.in_flight.begin(appointment_id)?;

    let appointment = load_visible(&state, &auth, appointment_id).await?;
    let cancellation = plan_cancellation(
        &appointment,
        auth.role,
        Local::now().naive_local(),
        Utc::now(),
        req.reason.as_deref(),
    )?;

    let updated = state
        .store
        .cancel_appointment(appointment_id, cancellation.at, &cancellation.reason)
        .await?
        .ok_or(LifecycleError::AlreadyCancelled)?;
    auth.ensure_live().await?;

    tracing::info!(
        appointment_id = %appointment_id,
        user_id = %auth.user_id,
        role = %auth.role,
        reason = %cancellation.reason,
        "appointment cancelled"
    );

    Ok(Json(ApiOk {
        data: view_for(updated, &auth),
    }))
}

/* ============================================================
   PATCH /appointments/{id}/status (staff)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: AppointmentStatus,
}

pub async fn update_status(
    State(state): State<AppState>,
    mut auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    if !auth.role.is_staff() {
        return Err(ApiError::forbidden("Only staff can change appointment status"));
    }
    let _guard = state.in_flight.begin(appointment_id)?;

    let appointment = load_visible(&state, &auth, appointment_id).await?;
    check_status_change(&appointment, req.status)?;

    let updated = state
        .store
        .update_appointment_status(appointment_id, req.status)
        .await?
        .ok_or(LifecycleError::Terminal)?;
    auth.ensure_live().await?;

    tracing::info!(
        appointment_id = %appointment_id,
        from = %appointment.status,
        to = %updated.status,
        "appointment status changed"
    );

    Ok(Json(ApiOk {
        data: view_for(updated, &auth),
    }))
}

/* ============================================================
   GET /appointments/{id}/calendar.ics
   ============================================================ */

/// Read-only; available whatever the appointment's status.
pub async fn export_calendar(
    State(state): State<AppState>,
    mut auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let appointment = load_visible(&state, &auth, appointment_id).await?;

    // the summary falls back to a generic title if the service lookup fails
    let service_name = match state.store.get_service(appointment.service_id).await {
        Ok(service) => service.map(|s| s.name),
        Err(e) => {
            tracing::warn!(error = %e, "service lookup failed during calendar export");
            None
        }
    };
    auth.ensure_live().await?;

    let ics = IcsEvent::from_appointment(&appointment, service_name.as_deref(), &state.calendar)
        .to_ics(&state.calendar);

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export_filename(&appointment)),
            ),
        ],
        ics,
    )
        .into_response())
}
