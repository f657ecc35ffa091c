//! Development stand-in for the external auth service.
//!
//! Speaks the same wire protocol the portal expects (`POST /auth/login`,
//! `POST /auth/refresh`, `GET /me`, `GET /users`) with HMAC-signed JWTs and
//! an in-memory user table. For local runs and tests only.

pub mod jwt;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Duration;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::auth::permissions::{self, Capability, READ_USER};
use crate::auth::{AuthTokens, LoginRequest, Principal, RefreshRequest, TokenPair};
use crate::clock::Clock;
use crate::error::ApiError;
use jwt::{Claims, JwtError, JwtKeys, TokenKind};

pub const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;
pub const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct DevUser {
    pub id: String,
    pub username: String,
    password: String,
    pub permissions: Vec<Capability>,
}

impl DevUser {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        permissions: impl IntoIterator<Item = Capability>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            password: password.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    fn principal(&self) -> Principal {
        Principal::new(self.id.clone(), self.username.clone(), self.permissions.iter().cloned())
    }
}

/// `admin`/`admin` with every capability and `viewer`/`viewer` with read
/// capabilities only.
pub fn seed_users() -> Vec<DevUser> {
    use crate::auth::permissions::*;

    vec![
        DevUser::new(
            "1",
            "admin",
            "admin",
            [
                CREATE_POST, READ_POST, UPDATE_POST, DELETE_POST,
                CREATE_USER, READ_USER, UPDATE_USER, DELETE_USER,
                CREATE_PERMISSION, READ_PERMISSION, UPDATE_PERMISSION, DELETE_PERMISSION,
                CREATE_ASSET, READ_ASSET, UPDATE_ASSET, DELETE_ASSET,
            ],
        ),
        DevUser::new("2", "viewer", "viewer", [READ_POST, READ_ASSET, READ_USER]),
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
}

/// Cheap to clone; clones share users, revocations and counters.
#[derive(Clone)]
pub struct DevAuthService {
    inner: Arc<Inner>,
}

struct Inner {
    keys: JwtKeys,
    clock: Arc<dyn Clock>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    users: RwLock<HashMap<String, DevUser>>,
    revoked: RwLock<HashSet<String>>,
    refresh_calls: AtomicUsize,
}

impl DevAuthService {
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Result<Self, JwtError> {
        Self::with_ttls(
            secret,
            clock,
            Duration::minutes(DEFAULT_ACCESS_TTL_MINUTES),
            Duration::days(DEFAULT_REFRESH_TTL_DAYS),
        )
    }

    pub fn with_ttls(
        secret: &str,
        clock: Arc<dyn Clock>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, JwtError> {
        let users = seed_users()
            .into_iter()
            .map(|user| (user.username.clone(), user))
            .collect();

        Ok(Self {
            inner: Arc::new(Inner {
                keys: JwtKeys::new(secret)?,
                clock,
                access_ttl,
                refresh_ttl,
                users: RwLock::new(users),
                revoked: RwLock::new(HashSet::new()),
                refresh_calls: AtomicUsize::new(0),
            }),
        })
    }

    pub fn add_user(&self, user: DevUser) {
        self.write_users().insert(user.username.clone(), user);
    }

    /// Replace a user's capabilities. Existing tokens stay valid.
    pub fn set_permissions(&self, username: &str, capabilities: Vec<Capability>) -> bool {
        match self.write_users().get_mut(username) {
            Some(user) => {
                user.permissions = capabilities;
                true
            }
            None => false,
        }
    }

    /// Invalidate every token issued to `username` until it logs in again.
    pub fn revoke(&self, username: &str) {
        if let Some(user) = self.read_users().get(username) {
            self.inner
                .revoked
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(user.id.clone());
        }
    }

    /// Number of refresh requests served so far.
    pub fn refresh_calls(&self) -> usize {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn login(&self, request: &LoginRequest) -> Result<TokenPair, ApiError> {
        let user = self
            .read_users()
            .get(&request.username)
            .filter(|user| user.password == request.password)
            .cloned()
            .ok_or_else(|| {
                tracing::info!("dev-auth: rejected login for '{}'", request.username);
                ApiError::unauthorized("Invalid credentials")
            })?;

        self.inner
            .revoked
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user.id);

        tracing::info!("dev-auth: issued tokens for '{}'", user.username);
        self.issue(&user.id)
    }

    pub fn refresh(&self, request: &RefreshRequest) -> Result<TokenPair, ApiError> {
        self.inner.refresh_calls.fetch_add(1, Ordering::SeqCst);

        let claims = self.verify(&request.refresher, TokenKind::Refresh)?;
        tracing::debug!("dev-auth: refreshing tokens for '{}'", claims.sub);
        self.issue(&claims.sub)
    }

    pub fn me(&self, headers: &HeaderMap) -> Result<Principal, ApiError> {
        let claims = self.authenticate(headers)?;
        self.user_by_id(&claims.sub)
            .map(|user| user.principal())
            .ok_or_else(|| ApiError::unauthorized("Unknown user"))
    }

    pub fn users(&self, headers: &HeaderMap) -> Result<Vec<UserSummary>, ApiError> {
        let principal = self.me(headers)?;
        if !permissions::has_capability(Some(&principal), &READ_USER) {
            return Err(ApiError::forbidden("Permission denied"));
        }

        let mut users: Vec<_> = self
            .read_users()
            .values()
            .map(|user| UserSummary {
                id: user.id.clone(),
                username: user.username.clone(),
            })
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    fn issue(&self, subject: &str) -> Result<TokenPair, ApiError> {
        let now = self.inner.clock.now();
        let access = Claims::new(subject, TokenKind::Access, now, self.inner.access_ttl);
        let refresh = Claims::new(subject, TokenKind::Refresh, now, self.inner.refresh_ttl);

        let sign = |claims: &Claims| {
            self.inner.keys.generate(claims).map_err(|e| {
                tracing::error!("dev-auth: {}", e);
                ApiError::internal_server_error("Token generation failed")
            })
        };

        Ok(TokenPair {
            access_token: sign(&access)?,
            access_expiry: access.exp,
            refresh_token: sign(&refresh)?,
            refresh_expiry: refresh.exp,
        })
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, ApiError> {
        let token = extract_jwt_from_headers(headers).map_err(ApiError::unauthorized)?;
        self.verify(&token, TokenKind::Access)
    }

    fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, ApiError> {
        let claims = self
            .inner
            .keys
            .validate(token, kind, self.inner.clock.now_secs())
            .map_err(|e| {
                tracing::debug!("dev-auth: {}", e);
                ApiError::unauthorized(e.to_string())
            })?;

        let revoked = self
            .inner
            .revoked
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&claims.sub);
        if revoked {
            return Err(ApiError::unauthorized("Token revoked"));
        }

        Ok(claims)
    }

    fn user_by_id(&self, id: &str) -> Option<DevUser> {
        self.read_users().values().find(|user| user.id == id).cloned()
    }

    fn read_users(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, DevUser>> {
        self.inner.users.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_users(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, DevUser>> {
        self.inner.users.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DevAuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevAuthService")
            .field("access_ttl", &self.inner.access_ttl)
            .field("refresh_ttl", &self.inner.refresh_ttl)
            .finish_non_exhaustive()
    }
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err("Empty JWT token".to_string()),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}

pub fn router(service: DevAuthService) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/me", get(me))
        .route("/users", get(users))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn login(State(service): State<DevAuthService>, Json(body): Json<LoginRequest>) -> Result<Json<AuthTokens>, ApiError> {
    service.login(&body).map(|pair| Json(pair.into()))
}

async fn refresh(
    State(service): State<DevAuthService>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<AuthTokens>, ApiError> {
    service.refresh(&body).map(|pair| Json(pair.into()))
}

async fn me(State(service): State<DevAuthService>, headers: HeaderMap) -> Result<Json<Principal>, ApiError> {
    service.me(&headers).map(Json)
}

async fn users(State(service): State<DevAuthService>, headers: HeaderMap) -> Result<Json<Vec<UserSummary>>, ApiError> {
    service.users(&headers).map(Json)
}
