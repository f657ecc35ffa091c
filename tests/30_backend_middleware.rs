#![cfg(feature = "dev-auth")]

mod common;

use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use reqwest::StatusCode;

use admin_portal::client::ServiceClient;
use admin_portal::clock::Clock;
use admin_portal::error::PortalError;
use admin_portal::session::{CookieChange, MemoryTokenStore, SessionCookie, SessionHandle, SessionState, TokenStore};

struct Fixture {
    auth: common::AuthServer,
    backend: common::MockBackend,
    posts: ServiceClient,
    store: Arc<MemoryTokenStore>,
}

impl Fixture {
    async fn start() -> Result<Self> {
        let auth = common::AuthServer::start().await?;
        let backend = common::MockBackend::start(auth.service.clone()).await?;
        let posts = ServiceClient::new("posts", &backend.base_url, reqwest::Client::new())?;
        Ok(Self {
            auth,
            backend,
            posts,
            store: Arc::new(MemoryTokenStore::new()),
        })
    }

    async fn session(&self, username: &str) -> Result<SessionHandle> {
        let manager = common::manager(&self.auth, self.store.clone())?;
        common::logged_in(&manager, username).await
    }
}

fn redirect_location(err: PortalError) -> String {
    match err {
        PortalError::Redirect(redirect) => {
            assert_eq!(redirect.status, StatusCode::FOUND);
            redirect.location
        }
        other => panic!("expected redirect, got {:?}", other),
    }
}

#[tokio::test]
async fn bearer_token_is_attached() -> Result<()> {
    let fx = Fixture::start().await?;
    let session = fx.session("viewer").await?;
    let tokens = session.tokens().await.expect("tokens");

    let posts: serde_json::Value = fx.posts.authorized(&session).get_json("/posts").await?;
    assert_eq!(posts[0]["slug"], "hello-world");
    assert_eq!(fx.backend.last_token(), Some(tokens.access_token));
    Ok(())
}

#[tokio::test]
async fn permission_401_is_returned_unchanged() -> Result<()> {
    let fx = Fixture::start().await?;
    let session = fx.session("viewer").await?;

    let client = fx.posts.authorized(&session);
    let res = client.send(client.get("/posts/locked")).await?;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await?;
    assert_eq!(body["error"], "not yours");

    assert!(session.is_valid().await);
    assert_eq!(session.state().await, SessionState::Active);
    assert_eq!(session.pending_change(), CookieChange::Set(session.cookie().expect("cookie")));
    Ok(())
}

#[tokio::test]
async fn revoked_token_ends_session() -> Result<()> {
    let fx = Fixture::start().await?;
    let session = fx.session("viewer").await?;

    fx.auth.service.revoke("viewer");
    let err = fx.posts.authorized(&session).get_json::<serde_json::Value>("/posts").await.unwrap_err();

    assert_eq!(redirect_location(err), "/login");
    assert!(fx.store.is_empty().await);
    assert_eq!(session.state().await, SessionState::Absent);
    assert_eq!(session.take_change(), CookieChange::Removed);
    Ok(())
}

#[tokio::test]
async fn unauthorized_with_invalid_session_redirects() -> Result<()> {
    let fx = Fixture::start().await?;
    let manager = common::manager(&fx.auth, fx.store.clone())?;
    let (cookie, _) = manager.authenticate("viewer", "viewer").await?;

    // Two hours idle: the token still works but the session does not
    let idle = SessionCookie {
        last_activity_at: fx.auth.clock.now_millis() - 7_200_000,
        ..cookie
    };
    let session = SessionHandle::new(manager, Some(idle));

    let client = fx.posts.authorized(&session);
    let err = client.send(client.get("/posts/locked")).await.unwrap_err();
    assert_eq!(redirect_location(err), "/login");

    // The idle cookie goes without a token ever being sent
    assert_eq!(fx.backend.last_token(), None);
    assert_eq!(session.take_change(), CookieChange::Removed);
    assert!(fx.store.get("2").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn idle_session_with_expired_access_token_is_not_served() -> Result<()> {
    let fx = Fixture::start().await?;
    let session = fx.session("viewer").await?;

    fx.auth.clock.advance(Duration::hours(2));
    let err = fx.posts.authorized(&session).get_json::<serde_json::Value>("/posts").await.unwrap_err();

    assert_eq!(redirect_location(err), "/login");
    assert_eq!(fx.auth.service.refresh_calls(), 0);
    assert_eq!(fx.backend.last_token(), None);
    assert!(!session.is_valid().await);
    assert!(session.cookie().is_none());
    Ok(())
}

#[tokio::test]
async fn expired_access_token_is_refreshed_before_sending() -> Result<()> {
    let fx = Fixture::start().await?;
    let session = fx.session("viewer").await?;
    let original = session.tokens().await.expect("tokens");

    fx.auth.clock.advance(Duration::minutes(16));
    let posts: serde_json::Value = fx.posts.authorized(&session).get_json("/posts").await?;
    assert!(posts.is_array());

    let sent = fx.backend.last_token().expect("bearer sent");
    assert_ne!(sent, original.access_token);
    assert_eq!(Some(sent), session.tokens().await.map(|t| t.access_token));
    assert_eq!(fx.auth.service.refresh_calls(), 1);
    assert!(session.is_valid().await);
    Ok(())
}

#[tokio::test]
async fn failed_refresh_sends_anonymously_then_redirects() -> Result<()> {
    let fx = Fixture::start().await?;
    let session = fx.session("viewer").await?;

    fx.auth.service.revoke("viewer");
    fx.auth.clock.advance(Duration::minutes(16));

    let err = fx.posts.authorized(&session).get_json::<serde_json::Value>("/posts").await.unwrap_err();
    assert_eq!(redirect_location(err), "/login");
    // The request still went out, without a token
    assert_eq!(fx.backend.seen_tokens.lock().unwrap().last().cloned(), Some(None));
    Ok(())
}

#[tokio::test]
async fn server_errors_pass_through() -> Result<()> {
    let fx = Fixture::start().await?;
    let session = fx.session("admin").await?;

    let client = fx.posts.authorized(&session);
    let res = client.send(client.get("/posts/boom")).await?;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(session.is_valid().await);

    let err = client.get_json::<serde_json::Value>("/posts/boom").await.unwrap_err();
    match err {
        PortalError::Api(api) => assert_eq!(api.status_code(), 502),
        other => panic!("expected api error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_is_an_ordinary_error() -> Result<()> {
    let fx = Fixture::start().await?;
    let session = fx.session("admin").await?;

    let port = portpicker::pick_unused_port().expect("free port");
    let dead = ServiceClient::new("assets", &format!("http://127.0.0.1:{}", port), reqwest::Client::new())?;
    let err = dead.authorized(&session).get_json::<serde_json::Value>("/assets").await.unwrap_err();

    assert!(!err.is_redirect());
    assert!(session.is_valid().await);
    Ok(())
}
