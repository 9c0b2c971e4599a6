mod auth;
mod backend;
mod calendar;
mod config;
mod middleware;
mod policy;

mod db;
mod error;
mod models;
mod routes;

use std::sync::Arc;

use crate::{
    backend::{AuthProvider, BackendError, RecordStore, SessionEvent, postgres::PgBackend},
    calendar::CalendarConfig,
    config::{BootstrapAdmin, Config},
    middleware::in_flight::InFlight,
    models::{AppState, Role},
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url).await?;
    let backend = Arc::new(PgBackend::new(pool, cfg.session_ttl_hours));

    if let Some(admin) = &cfg.bootstrap_super_admin {
        bootstrap_super_admin(backend.as_ref(), admin).await?;
    }

    spawn_session_logger(backend.subscribe());

    let state = AppState {
        auth: backend.clone(),
        store: backend,
        calendar: CalendarConfig {
            domain: cfg.calendar_domain.clone(),
            prodid: cfg.calendar_prodid.clone(),
        },
        in_flight: InFlight::default(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ])
        .expose_headers([header::CONTENT_DISPOSITION]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Makes sure the configured account exists and holds the super_admin role.
async fn bootstrap_super_admin(backend: &PgBackend, admin: &BootstrapAdmin) -> anyhow::Result<()> {
    let user_id = match backend
        .create_user(&admin.email, &admin.password, Role::SuperAdmin)
        .await
    {
        Ok(id) => id,
        Err(BackendError::Conflict(_)) => {
            let (_, session) = backend
                .sign_in(&admin.email, &admin.password)
                .await
                .map_err(|e| anyhow::anyhow!("bootstrap super admin exists with another password: {e}"))?;
            backend.sign_out(session.session_id).await?;
            session.user_id
        }
        Err(e) => return Err(e.into()),
    };

    backend
        .set_profile_role(user_id, Role::SuperAdmin)
        .await?
        .ok_or_else(|| anyhow::anyhow!("bootstrap super admin has no profile"))?;

    tracing::info!(user_id = %user_id, "bootstrap super admin ready");
    Ok(())
}

fn spawn_session_logger(mut events: tokio::sync::broadcast::Receiver<SessionEvent>) {
    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match events.recv().await {
                Ok(SessionEvent::SignedIn { session_id, user_id }) => {
                    tracing::debug!(%session_id, %user_id, "session started");
                }
                Ok(SessionEvent::SignedOut { session_id, user_id }) => {
                    tracing::debug!(%session_id, %user_id, "session ended");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "session logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
