use std::sync::{Arc, Mutex, PoisonError};

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::{evaluate, RefreshError, Session, SessionCookie, SessionManager, SessionState};
use crate::auth::{Principal, TokenPair};
use crate::client::AuthError;
use crate::error::ApiError;

/// What the response should do with the session cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CookieChange {
    #[default]
    Unchanged,
    Set(SessionCookie),
    Removed,
}

#[derive(Debug, Default)]
struct CookieSlot {
    current: Option<SessionCookie>,
    change: CookieChange,
}

/// Per-request view of the caller's session.
///
/// Created by the session cookie layer from the decrypted cookie and put in
/// the request extensions; handlers extract it like any other value. Cookie
/// mutations are recorded here and written to the response by the layer.
#[derive(Clone)]
pub struct SessionHandle {
    manager: SessionManager,
    slot: Arc<Mutex<CookieSlot>>,
}

impl SessionHandle {
    pub fn new(manager: SessionManager, cookie: Option<SessionCookie>) -> Self {
        Self {
            manager,
            slot: Arc::new(Mutex::new(CookieSlot {
                current: cookie,
                change: CookieChange::Unchanged,
            })),
        }
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn cookie(&self) -> Option<SessionCookie> {
        self.lock().current.clone()
    }

    /// Pending cookie mutation, leaving `Unchanged` behind.
    pub fn take_change(&self) -> CookieChange {
        std::mem::take(&mut self.lock().change)
    }

    pub fn pending_change(&self) -> CookieChange {
        self.lock().change.clone()
    }

    /// `Absent --login--> Active`. On success the session cookie is set with
    /// `login_at == last_activity_at == now`.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        // A new login replaces whatever session the browser had
        if let Some(previous) = self.cookie() {
            tracing::debug!("Replacing session of '{}' with a new login", previous.principal_id);
        }

        let (cookie, session) = self.manager.authenticate(username, password).await?;
        self.set_cookie(cookie);
        Ok(session)
    }

    /// The full session, whatever its state. `None` when absent.
    pub async fn session(&self) -> Option<Session> {
        let cookie = self.cookie()?;
        let credentials = self.manager.load(&cookie).await?;
        (credentials.principal.id == cookie.principal_id).then(|| Session::assemble(&cookie, credentials))
    }

    pub async fn state(&self) -> SessionState {
        self.manager.state_of(self.cookie().as_ref()).await
    }

    /// Principal and tokens present, access token unexpired, not inactive
    /// for too long. Reads only; never refreshes or writes.
    pub async fn is_valid(&self) -> bool {
        self.state().await == SessionState::Active
    }

    /// The principal of a valid session.
    pub async fn principal(&self) -> Option<Principal> {
        let cookie = self.cookie()?;
        let credentials = self.manager.load(&cookie).await?;
        let state = evaluate(
            Some(&cookie),
            Some(&credentials),
            self.manager.clock().now_millis(),
            self.manager.policy(),
        );
        (state == SessionState::Active).then_some(credentials.principal)
    }

    /// Stored token pair, expired or not.
    pub async fn tokens(&self) -> Option<TokenPair> {
        self.session().await.map(|s| s.tokens)
    }

    /// `AccessExpired --refresh--> Active`, or `--> Absent` on failure.
    ///
    /// Only an `Active` or `AccessExpired` session is refreshed. An idle or
    /// too old session is ended here, whatever its tokens say.
    pub async fn refresh(&self) -> Result<TokenPair, RefreshError> {
        let Some(cookie) = self.cookie() else {
            return Err(RefreshError::NoSession);
        };

        match self.state().await {
            SessionState::Active | SessionState::AccessExpired => {}
            SessionState::RefreshExpired => {
                self.expire().await;
                return Err(RefreshError::Expired);
            }
            SessionState::Absent => {
                self.forget();
                return Err(RefreshError::NoSession);
            }
        }

        match self.manager.refresh(&cookie.principal_id).await {
            Ok(tokens) => {
                let now = self.manager.clock().now_millis();
                self.set_cookie(SessionCookie {
                    last_activity_at: now,
                    ..cookie
                });
                Ok(tokens)
            }
            Err(e) => {
                // Store entry is already gone; drop the cookie too
                self.remove_cookie();
                Err(e)
            }
        }
    }

    /// Record activity, coalesced to at most one cookie write per touch
    /// interval.
    pub fn touch(&self) {
        let mut slot = self.lock();
        let Some(cookie) = slot.current.as_ref() else {
            return;
        };
        if let Some(touched) = self.manager.touched(cookie) {
            slot.current = Some(touched.clone());
            slot.change = CookieChange::Set(touched);
        }
    }

    /// Re-fetch the principal snapshot from the auth service.
    pub async fn reload_principal(&self) -> Result<Principal, AuthError> {
        let cookie = self.cookie().ok_or(AuthError::Refresh(RefreshError::NoSession))?;
        self.manager.reload_principal(&cookie.principal_id).await
    }

    /// Any state `--> Absent`. Idempotent and infallible: store failures
    /// are logged by the manager.
    pub async fn clear(&self) {
        if let Some(cookie) = self.cookie() {
            self.manager.revoke(&cookie.principal_id).await;
        }
        self.remove_cookie();
    }

    /// End a session that is no longer usable.
    ///
    /// Inactivity and max age belong to this browser's cookie alone, so only
    /// the cookie goes; other browsers of the same principal keep the shared
    /// store entry. Dead tokens take the store entry with them.
    pub async fn expire(&self) {
        let Some(cookie) = self.cookie() else {
            return;
        };

        let now = self.manager.clock().now_millis();
        let policy = self.manager.policy();
        if policy.is_inactive(&cookie, now) || policy.is_too_old(&cookie, now) {
            tracing::info!("Session cookie of '{}' timed out", cookie.principal_id);
            self.forget();
        } else {
            self.clear().await;
        }
    }

    /// Drop this browser's cookie, leaving the store entry alone.
    pub fn forget(&self) {
        self.remove_cookie();
    }

    /// User-initiated logout. Always succeeds from the caller's view.
    pub async fn logout(&self) {
        if let Some(cookie) = self.cookie() {
            tracing::info!("Logging out '{}'", cookie.principal_id);
        }
        self.clear().await;
    }

    fn set_cookie(&self, cookie: SessionCookie) {
        let mut slot = self.lock();
        slot.current = Some(cookie.clone());
        slot.change = CookieChange::Set(cookie);
    }

    fn remove_cookie(&self) {
        let mut slot = self.lock();
        let had_cookie = slot.current.take().is_some();
        if had_cookie || matches!(slot.change, CookieChange::Set(_)) {
            slot.change = CookieChange::Removed;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CookieSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("slot", &*self.lock())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<SessionHandle>().cloned().ok_or_else(|| {
            tracing::error!("SessionHandle requested but the session layer is not installed");
            ApiError::internal_server_error("Session layer not configured")
        })
    }
}
