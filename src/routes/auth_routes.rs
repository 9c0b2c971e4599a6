// src/routes/auth_routes.rs

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, OkData, Profile},
    policy::session::{View, landing_for, resolve_landing},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponseData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub profile: Profile,
    pub view: View,
}

#[derive(Debug, Serialize)]
pub struct MeResponseData {
    pub profile: Profile,
    pub session_id: Uuid,
    pub view: View,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiOk<LoginResponseData>>, ApiError> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }

    let (access_token, session) = state.auth.sign_in(email, &req.password).await?;
    let profile = state.store.get_profile(session.user_id).await?;
    let view = match resolve_landing(Some(&session), profile.as_ref()) {
        Ok(view) => view,
        Err(e) => {
            // do not leave a usable token behind for an identity without a role
            let _ = state.auth.sign_out(session.session_id).await;
            return Err(e.into());
        }
    };
    let profile = profile.ok_or_else(ApiError::session_expired)?;

    tracing::info!(user_id = %session.user_id, role = %profile.role, view = ?view, "signed in");

    Ok(Json(ApiOk {
        data: LoginResponseData {
            access_token,
            expires_at: session.expires_at,
            profile,
            view,
        },
    }))
}

pub async fn me(auth: AuthContext) -> Result<Json<ApiOk<MeResponseData>>, ApiError> {
    Ok(Json(ApiOk {
        data: MeResponseData {
            view: landing_for(auth.role),
            session_id: auth.session_id,
            profile: auth.profile,
        },
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    state.auth.sign_out(auth.session_id).await?;
    tracing::info!(user_id = %auth.user_id, session_id = %auth.session_id, "signed out");

    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::models::Role;
    use crate::routes::test_support::{app_with, body_json, request};
    use axum::http::StatusCode;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn login_returns_token_and_landing_view() {
        let backend = Arc::new(MemoryBackend::default());
        backend.seed_user("boss@example.com", Role::SuperAdmin);

        let body = serde_json::json!({"email": "boss@example.com", "password": "password123"});
        let resp = app_with(backend.clone())
            .oneshot(request("POST", "/api/v1/auth/login", None, Some(body)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["data"]["view"], "super_admin_dashboard");
        let token = json["data"]["access_token"].as_str().unwrap().to_string();

        let resp = app_with(backend)
            .oneshot(request("GET", "/api/v1/auth/me", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn login_email_is_case_insensitive() {
        let backend = Arc::new(MemoryBackend::default());
        backend.seed_user("Dana@Example.com", Role::Customer);

        let body = serde_json::json!({"email": "  DANA@example.COM ", "password": "password123"});
        let resp = app_with(backend)
            .oneshot(request("POST", "/api/v1/auth/login", None, Some(body)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["data"]["profile"]["email"], "dana@example.com");
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let backend = Arc::new(MemoryBackend::default());
        backend.seed_user("a@example.com", Role::Customer);

        let body = serde_json::json!({"email": "a@example.com", "password": "nope"});
        let resp = app_with(backend)
            .oneshot(request("POST", "/api/v1/auth/login", None, Some(body)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let backend = Arc::new(MemoryBackend::default());
        let (_, token) = backend.seed_user("a@example.com", Role::Customer);

        let resp = app_with(backend.clone())
            .oneshot(request("POST", "/api/v1/auth/logout", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app_with(backend)
            .oneshot(request("GET", "/api/v1/auth/me", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn session_without_profile_is_forbidden() {
        let backend = Arc::new(MemoryBackend::default());
        let token = backend.seed_session_without_profile();

        let resp = app_with(backend)
            .oneshot(request("GET", "/api/v1/auth/me", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "NO_PROFILE");
    }
}
