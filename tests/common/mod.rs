#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use admin_portal::app::{router, AppState};
use admin_portal::auth::{Principal, TokenPair};
use admin_portal::client::{AuthApi, ServiceClient};
use admin_portal::clock::ManualClock;
use admin_portal::config::AppConfig;
use admin_portal::devauth::{self, DevAuthService};
use admin_portal::session::{
    MemoryTokenStore, SessionHandle, SessionManager, SessionPolicy, StoreError, StoredCredentials, TokenStore,
};

pub const SESSION_SECRET: &str = "test-session-secret-test-session-secret-test-session-secret-0123456789";

/// Bind an unused local port.
pub async fn listen() -> Result<(tokio::net::TcpListener, String)> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to bind port {}", port))?;
    Ok((listener, format!("http://127.0.0.1:{}", port)))
}

/// Dev auth service on its own port, driven by a manual clock.
pub struct AuthServer {
    pub service: DevAuthService,
    pub clock: Arc<ManualClock>,
    pub base_url: String,
}

impl AuthServer {
    pub async fn start() -> Result<Self> {
        let clock = Arc::new(ManualClock::starting_now());
        let service = DevAuthService::new("dev-auth-test-secret", clock.clone())?;

        let (listener, base_url) = listen().await?;
        let app = devauth::router(service.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            service,
            clock,
            base_url,
        })
    }

    pub fn auth_api(&self) -> Result<AuthApi> {
        let client = ServiceClient::new("auth", &self.base_url, reqwest::Client::new())?;
        Ok(AuthApi::new(client))
    }
}

/// Posts and assets backend. Accepts any bearer token the dev auth service
/// accepts and records the Authorization header of every request.
#[derive(Clone)]
pub struct MockBackend {
    auth: DevAuthService,
    pub seen_tokens: Arc<Mutex<Vec<Option<String>>>>,
    pub base_url: String,
}

impl MockBackend {
    pub async fn start(auth: DevAuthService) -> Result<Self> {
        let (listener, base_url) = listen().await?;
        let backend = Self {
            auth,
            seen_tokens: Arc::new(Mutex::new(Vec::new())),
            base_url,
        };

        let app = Router::new()
            .route("/posts", get(posts_list))
            .route("/posts/:slug", get(post_get).delete(post_delete))
            .route("/assets", get(assets_list))
            .with_state(backend.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(backend)
    }

    pub fn last_token(&self) -> Option<String> {
        self.seen_tokens.lock().unwrap().last().cloned().flatten()
    }

    fn check(&self, headers: &HeaderMap) -> Result<Principal, Response> {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        self.seen_tokens.lock().unwrap().push(token);

        self.auth
            .me(headers)
            .map_err(|_| (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"}))).into_response())
    }
}

async fn posts_list(State(backend): State<MockBackend>, headers: HeaderMap) -> Response {
    match backend.check(&headers) {
        Ok(_) => Json(json!([{"slug": "hello-world", "title": "Hello"}])).into_response(),
        Err(response) => response,
    }
}

async fn post_get(State(backend): State<MockBackend>, headers: HeaderMap, Path(slug): Path<String>) -> Response {
    if let Err(response) = backend.check(&headers) {
        return response;
    }
    match slug.as_str() {
        // Valid token, but the backend still answers 401
        "locked" => (StatusCode::UNAUTHORIZED, Json(json!({"error": "not yours"}))).into_response(),
        "boom" => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"}))).into_response(),
        "missing" => StatusCode::NOT_FOUND.into_response(),
        _ => Json(json!({"slug": slug, "title": "Hello"})).into_response(),
    }
}

async fn post_delete(State(backend): State<MockBackend>, headers: HeaderMap) -> Response {
    match backend.check(&headers) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(response) => response,
    }
}

async fn assets_list(State(backend): State<MockBackend>, headers: HeaderMap) -> Response {
    match backend.check(&headers) {
        Ok(_) => Json(json!([{"id": "a-1", "name": "logo.png"}])).into_response(),
        Err(response) => response,
    }
}

/// The full stack: dev auth, mock backend and the portal, all sharing the
/// auth server's clock.
pub struct Stack {
    pub auth: AuthServer,
    pub backend: MockBackend,
    pub store: Arc<MemoryTokenStore>,
    pub portal_url: String,
}

impl Stack {
    pub async fn start() -> Result<Self> {
        let auth = AuthServer::start().await?;
        let backend = MockBackend::start(auth.service.clone()).await?;
        let store = Arc::new(MemoryTokenStore::new());

        let auth_url = auth.base_url.clone();
        let backend_url = backend.base_url.clone();
        let config = AppConfig::from_lookup(|key| match key {
            "SESSION_SECRET" => Some(SESSION_SECRET.to_string()),
            "AUTH_API" => Some(auth_url.clone()),
            "POSTS_API" | "ASSETS_API" => Some(backend_url.clone()),
            "BACKEND_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        });

        let state = AppState::new(config, store.clone(), auth.clock.clone())?;
        let (listener, portal_url) = listen().await?;
        let app = router(state);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            auth,
            backend,
            store,
            portal_url,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.portal_url, path)
    }

    pub fn clock(&self) -> &ManualClock {
        &self.auth.clock
    }

    /// Logs in through the form and returns the cookie-carrying browser.
    pub async fn logged_in_browser(&self, username: &str, password: &str) -> Result<reqwest::Client> {
        let browser = browser()?;
        let res = browser
            .post(self.url("/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::SEE_OTHER, "login failed: {}", res.status());
        Ok(browser)
    }
}

/// Cookie-keeping client that does not follow redirects.
pub fn browser() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

pub fn location(res: &reqwest::Response) -> Option<String> {
    res.headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Session manager talking to `auth`, backed by `store`, on the auth clock.
pub fn manager(auth: &AuthServer, store: Arc<dyn TokenStore>) -> Result<SessionManager> {
    Ok(SessionManager::new(
        store,
        auth.auth_api()?,
        auth.clock.clone(),
        SessionPolicy::default(),
        "/login",
    ))
}

/// A fresh session handle logged in as `username` (password == username).
pub async fn logged_in(manager: &SessionManager, username: &str) -> Result<SessionHandle> {
    let handle = SessionHandle::new(manager.clone(), None);
    handle.login(username, username).await?;
    Ok(handle)
}

/// Token store whose every operation fails.
#[derive(Debug, Default)]
pub struct BrokenStore;

#[async_trait]
impl TokenStore for BrokenStore {
    async fn put(&self, _: &str, _: StoredCredentials) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk on fire".into()))
    }

    async fn get(&self, _: &str) -> Result<Option<StoredCredentials>, StoreError> {
        Err(StoreError::Unavailable("disk on fire".into()))
    }

    async fn clear(&self, _: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk on fire".into()))
    }

    async fn replace_tokens(&self, _: &str, _: TokenPair) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("disk on fire".into()))
    }

    async fn replace_principal(&self, _: &str, _: Principal) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("disk on fire".into()))
    }
}

/// Store that wraps the memory store but fails `clear`.
#[derive(Debug, Default)]
pub struct UnclearableStore {
    pub inner: MemoryTokenStore,
}

#[async_trait]
impl TokenStore for UnclearableStore {
    async fn put(&self, id: &str, credentials: StoredCredentials) -> Result<(), StoreError> {
        self.inner.put(id, credentials).await
    }

    async fn get(&self, id: &str) -> Result<Option<StoredCredentials>, StoreError> {
        self.inner.get(id).await
    }

    async fn clear(&self, _: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("read-only replica".into()))
    }

    async fn replace_tokens(&self, id: &str, tokens: TokenPair) -> Result<bool, StoreError> {
        self.inner.replace_tokens(id, tokens).await
    }

    async fn replace_principal(&self, id: &str, principal: Principal) -> Result<bool, StoreError> {
        self.inner.replace_principal(id, principal).await
    }
}
