use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::middleware::auth_context::{AuthContext, MaybeAuth};
use crate::models::{ApiOk, AppState};
use crate::policy::{
    dashboard::{Dashboard, DashboardPolicy},
    session::{View, authorize_view, landing_for},
};

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    /// The view the client is trying to open; absent means the generic landing page.
    pub view: Option<View>,
}

#[derive(Serialize)]
pub struct HomeData {
    pub requested: Option<View>,
    pub view: View,
    pub redirect: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/home", get(home))
        .route("/dashboard", get(dashboard))
}

/// Role-based routing decision. Works without a session.
pub async fn home(
    MaybeAuth(auth): MaybeAuth,
    Query(q): Query<HomeQuery>,
) -> Result<Json<ApiOk<HomeData>>, ApiError> {
    let role = auth.as_ref().map(|a| a.role);

    let (view, redirect) = match q.view {
        Some(requested) => {
            let decision = authorize_view(requested, role);
            let target = decision.target(requested);
            (target, target != requested)
        }
        None => (role.map(landing_for).unwrap_or(View::Unauthenticated), false),
    };

    Ok(Json(ApiOk {
        data: HomeData {
            requested: q.view,
            view,
            redirect,
        },
    }))
}

/// Same handler for every role; `DashboardPolicy` decides what is shown.
pub async fn dashboard(
    State(state): State<AppState>,
    mut auth: AuthContext,
) -> Result<Json<ApiOk<Dashboard>>, ApiError> {
    let policy = DashboardPolicy::for_role(auth.role, auth.user_id);
    let rows = state.store.list_appointments(policy.scope.filter()).await?;
    auth.ensure_live().await?;

    let now = Local::now().naive_local();
    let board = policy.render(rows, now, now.date());

    tracing::debug!(
        user_id = %auth.user_id,
        role = %auth.role,
        count = board.appointments.len(),
        "dashboard rendered"
    );

    Ok(Json(ApiOk { data: board }))
}
