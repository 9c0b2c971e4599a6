use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::TryRecvError};
use uuid::Uuid;

use crate::backend::{AuthProvider, SessionEvent};
use crate::error::ApiError;
use crate::models::{AppState, Profile, Role};
use crate::policy::session::AccessError;

/// Request-scoped identity: the live session plus the caller's profile.
///
/// Holds a subscription to session events taken before the session was
/// looked up, so a sign-out that lands while the handler is awaiting the
/// backend is still seen by `ensure_live`.
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    pub session_id: Uuid,
    pub profile: Profile,
    expires_at: DateTime<Utc>,
    access_token: String,
    auth: Arc<dyn AuthProvider>,
    events: broadcast::Receiver<SessionEvent>,
    ended: bool,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl AuthContext {
    /// Fails with `SESSION_EXPIRED` once the session behind this request has ended.
    /// Handlers call it after a backend round-trip and drop the result on error.
    pub async fn ensure_live(&mut self) -> Result<(), ApiError> {
        let mut recheck = false;
        loop {
            match self.events.try_recv() {
                Ok(SessionEvent::SignedOut { session_id, .. }) if session_id == self.session_id => {
                    self.ended = true;
                }
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "session event stream lagged");
                    recheck = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        if !self.ended && Utc::now() >= self.expires_at {
            self.ended = true;
        }

        if !self.ended && recheck {
            self.ended = self.auth.get_session(&self.access_token).await?.is_none();
        }

        if self.ended {
            tracing::info!(user_id = %self.user_id, session_id = %self.session_id, "discarding result of ended session");
            return Err(ApiError::session_expired());
        }
        Ok(())
    }
}

/// `Ok(None)` only when the request carries no bearer token. A token that no
/// longer maps to a live session is `SESSION_EXPIRED`, and a session without a
/// profile is an error: neither may fall back to anonymous or a default role.
async fn authenticate(parts: &mut Parts, state: &AppState) -> Result<Option<AuthContext>, ApiError> {
    // Extract Authorization: Bearer <token>
    let Ok(TypedHeader(authz)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
    else {
        return Ok(None);
    };

    let events = state.auth.subscribe();

    let Some(session) = state.auth.get_session(authz.token()).await? else {
        return Err(ApiError::session_expired());
    };

    let profile = state
        .store
        .get_profile(session.user_id)
        .await?
        .ok_or(AccessError::MissingProfile(session.user_id))?;

    Ok(Some(AuthContext {
        user_id: session.user_id,
        role: profile.role,
        session_id: session.session_id,
        profile,
        expires_at: session.expires_at,
        access_token: authz.token().to_string(),
        auth: state.auth.clone(),
        events,
        ended: false,
    }))
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            authenticate(parts, state)
                .await?
                .ok_or_else(ApiError::session_expired)
        }
    }
}

/// For routes that also serve anonymous callers.
#[derive(Debug)]
pub struct MaybeAuth(pub Option<AuthContext>);

impl FromRequestParts<AppState> for MaybeAuth {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move { Ok(MaybeAuth(authenticate(parts, state).await?)) }
    }
}
