use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use time;

use crate::clients::Mailer;
use crate::config::Config;
use crate::state::SharedState;

mod admin_users;
pub mod auth;
mod dashboard;
mod documents;
mod error;
mod guilds;
mod profile;
mod types;
mod validation;

pub use error::ApiError;
pub use types::*;

use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn mailer(&self) -> &Arc<dyn Mailer> {
        &self.shared.mailer
    }

    #[must_use]
    pub fn provision(&self) -> &Arc<dyn crate::services::ProvisionService> {
        &self.shared.provision
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<dyn crate::services::AuthService> {
        &self.shared.auth
    }
}

#[must_use]
pub fn create_app_state(shared: Arc<SharedState>) -> Arc<AppState> {
    Arc::new(AppState { shared })
}

pub async fn create_app_state_from_config(config: Config) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared))
}

/// Test hook: substitute a recording mailer.
pub async fn create_app_state_with_mailer(
    config: Config,
    mailer: Arc<dyn Mailer>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::with_mailer(config, mailer).await?);
    Ok(create_app_state(shared))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let (cors_origins, secure_cookies) = {
        let config = state.config().read().await;
        (
            config.server.cors_allowed_origins.clone(),
            config.server.secure_cookies,
        )
    };

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(60)));

    let api_router = Router::new()
        .merge(create_protected_router())
        .merge(create_admin_router())
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/otp", post(auth::request_otp))
        .route("/auth/verify-otp", post(auth::verify_otp))
        .route("/auth/set-password", post(auth::set_password))
        .layer(session_layer)
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(auth::get_current_user))
        .route("/auth/password", put(auth::change_password))
        .route("/users/me", get(profile::get_my_profile))
        .route("/users/me", put(profile::update_my_profile))
        .route("/documents", get(documents::list_documents))
        .route("/dashboard/summary", get(dashboard::get_summary))
        .route_layer(middleware::from_fn(auth::auth_middleware))
}

fn create_admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/users", get(admin_users::list_users))
        .route("/admin/users", post(admin_users::create_user))
        .route("/admin/users/{id}", put(admin_users::update_user))
        .route("/admin/users/{id}", delete(admin_users::delete_user))
        .route(
            "/admin/users/{id}/resend-setup",
            post(admin_users::resend_setup),
        )
        .route("/admin/users/upload", post(admin_users::upload_users))
        .route("/admin/guilds", get(guilds::list_guilds))
        .route("/admin/guilds", post(guilds::create_guild))
        .route("/admin/guilds/{id}", put(guilds::update_guild))
        .route("/admin/guilds/{id}", delete(guilds::delete_guild))
        .route_layer(middleware::from_fn(auth::require_admin))
}
