pub mod analytics;
pub mod announcements;
pub mod auth;
pub mod challenges;
pub mod donations;
pub mod error;
pub mod export;
pub mod form;
pub mod middleware;
pub mod newsfeed;
pub mod reports;
pub mod storage;
pub mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tracing::error;

use foodshare_db::{Connection, Database};

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_auth;
use crate::storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub storage: Storage,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

/// Run blocking work (hashing, SQLite) off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("background task failed"))
        })?
        .map_err(|e| {
            error!("DB error: {:#}", e);
            ApiError::Internal(e)
        })
}

/// Run `f` against the shared connection on the blocking pool.
pub(crate) async fn run_db<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> anyhow::Result<T> + Send + 'static,
{
    let state = state.clone();
    blocking(move || state.db.with_conn(f)).await
}

async fn health() -> &'static str {
    "ok"
}

/// Every API route. `/admin/*` sits behind [`require_auth`].
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/health", get(health));

    let admin_routes = Router::new()
        .route("/admin/users", get(users::users_page).post(users::user_action))
        .route("/admin/users/{id}", get(users::user_profile))
        .route(
            "/admin/donations",
            get(donations::donations_page).post(donations::donation_action),
        )
        .route("/admin/donations/approvals", get(donations::approvals_page))
        .route("/admin/donations/expired", get(donations::expired_page))
        .route(
            "/admin/announcements",
            get(announcements::announcements_page).post(announcements::announcement_action),
        )
        .route(
            "/admin/challenges",
            get(challenges::challenges_page).post(challenges::challenge_action),
        )
        .route("/admin/challenges/progress", get(challenges::progress_page))
        .route(
            "/admin/challenges/{id}/participants",
            get(challenges::participants_page),
        )
        .route(
            "/admin/newsfeed",
            get(newsfeed::newsfeed_page).post(newsfeed::newsfeed_action),
        )
        .route("/admin/analytics", get(analytics::analytics_page))
        .route("/admin/reports", get(reports::reports_page))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .with_state(state)
}
