use std::sync::Arc;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::Key;
use tower_http::trace::TraceLayer;

use crate::client::{AuthApi, Backends, ClientBuildError};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::handlers::{protected, public};
use crate::middleware::session_cookie_middleware;
use crate::session::{SessionManager, SessionPolicy, TokenStore};

/// Minimum length of `SESSION_SECRET` in bytes.
pub const MIN_SECRET_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("SESSION_SECRET must be set in production")]
    MissingSecret,

    #[error("SESSION_SECRET must be at least {MIN_SECRET_LEN} bytes")]
    ShortSecret,

    #[error(transparent)]
    Client(#[from] ClientBuildError),
}

/// Everything a request handler can reach. Built once at startup and
/// cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: SessionManager,
    pub backends: Backends,
    cookie_key: Key,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Result<Self, StartupError> {
        let cookie_key = cookie_key(&config)?;
        let backends = Backends::from_config(&config.backends)?;

        let sessions = SessionManager::new(
            store,
            AuthApi::new(backends.auth.clone()),
            clock,
            SessionPolicy::from_config(&config.session),
            config.routes.login.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            sessions,
            backends,
            cookie_key,
        })
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

fn cookie_key(config: &AppConfig) -> Result<Key, StartupError> {
    match config.session.secret.as_deref() {
        Some(secret) => Key::try_from(secret.as_bytes()).map_err(|_| StartupError::ShortSecret),
        None if config.is_production() => Err(StartupError::MissingSecret),
        None => {
            tracing::warn!("SESSION_SECRET not set; using an ephemeral cookie key. Sessions end on restart.");
            Ok(Key::generate())
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/health", get(public::health))
        .merge(session_routes())
        // Guarded pages
        .merge(page_routes())
        .merge(resource_routes())
        // Global middleware
        .layer(middleware::from_fn_with_state(state.clone(), session_cookie_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(public::login_form).post(public::login_submit))
        .route("/logout", post(public::logout))
}

fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(protected::dashboard))
        .route("/me", get(protected::me))
}

fn resource_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(protected::posts_list))
        .route("/posts/:slug", get(protected::post_get).delete(protected::post_delete))
        .route("/assets", get(protected::assets_list))
        .route("/users", get(protected::users_list))
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.config.environment)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}
