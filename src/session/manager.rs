use std::sync::Arc;

use futures::FutureExt;

use super::refresh::{RefreshGate, RefreshOutcome};
use super::{evaluate, RefreshError, Session, SessionCookie, SessionPolicy, SessionState, StoredCredentials, TokenStore};
use crate::auth::Principal;
use crate::client::{AuthApi, AuthError};
use crate::clock::Clock;

/// Process-wide half of the session layer: store, auth service, clock and
/// timing policy. Cheap to clone; every request gets a
/// [`SessionHandle`](super::SessionHandle) built on top of it.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    auth: AuthApi,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
    login_path: String,
    gate: Arc<RefreshGate>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        auth: AuthApi,
        clock: Arc<dyn Clock>,
        policy: SessionPolicy,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            auth,
            clock,
            policy,
            login_path: login_path.into(),
            gate: Arc::new(RefreshGate::default()),
        }
    }

    pub fn auth(&self) -> &AuthApi {
        &self.auth
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Exchange credentials, fetch the principal and persist both.
    ///
    /// Every failure collapses to [`AuthError::InvalidCredentials`]; the
    /// real cause only goes to the log.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<(SessionCookie, Session), AuthError> {
        match self.try_authenticate(username, password).await {
            Ok(session) => {
                tracing::info!("User '{}' logged in", session.1.principal.display_name);
                Ok(session)
            }
            Err(AuthError::InvalidCredentials) => {
                tracing::info!("Login rejected for '{}'", username);
                Err(AuthError::InvalidCredentials)
            }
            Err(e) => {
                tracing::warn!("Login for '{}' failed: {}", username, e);
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    async fn try_authenticate(&self, username: &str, password: &str) -> Result<(SessionCookie, Session), AuthError> {
        let tokens = self.auth.login(username, password).await?;

        let now_secs = self.clock.now_secs();
        if !tokens.is_consistent() || tokens.access_expired(now_secs) {
            return Err(AuthError::Decode {
                service: "auth",
                reason: "login returned already expired or inconsistent tokens".to_string(),
            });
        }

        let principal = self.auth.me(&tokens.access_token).await?;
        let credentials = StoredCredentials {
            principal: principal.clone(),
            tokens: tokens.clone(),
        };
        self.store.put(&principal.id, credentials.clone()).await?;

        let cookie = SessionCookie::new(principal.id.clone(), self.clock.now_millis());
        let session = Session::assemble(&cookie, credentials);
        Ok((cookie, session))
    }

    /// Store lookup for a cookie. Store failures are logged and read as
    /// "no session" so page rendering never breaks on them.
    pub async fn load(&self, cookie: &SessionCookie) -> Option<StoredCredentials> {
        match self.store.get(&cookie.principal_id).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Token store read for '{}' failed: {}", cookie.principal_id, e);
                None
            }
        }
    }

    pub async fn state_of(&self, cookie: Option<&SessionCookie>) -> SessionState {
        let Some(cookie) = cookie else {
            return SessionState::Absent;
        };
        let credentials = self.load(cookie).await;
        evaluate(Some(cookie), credentials.as_ref(), self.clock.now_millis(), &self.policy)
    }

    /// Obtain a fresh token pair for `principal_id` from the auth service.
    ///
    /// Concurrent calls for the same principal share one request. On any
    /// failure the store entry is cleared before returning.
    pub async fn refresh(&self, principal_id: &str) -> RefreshOutcome {
        let store = self.store.clone();
        let auth = self.auth.clone();
        let clock = self.clock.clone();
        let key = principal_id.to_string();

        self.gate
            .run(principal_id, move || {
                async move {
                    let outcome = perform_refresh(store.as_ref(), &auth, clock.as_ref(), &key).await;
                    if let Err(e) = &outcome {
                        tracing::info!("Token refresh for '{}' failed: {}; clearing session", key, e);
                        if let Err(store_err) = store.clear(&key).await {
                            tracing::warn!("Could not clear credentials for '{}': {}", key, store_err);
                        }
                    }
                    outcome
                }
                .boxed()
            })
            .await
    }

    /// Drop the stored credentials for a principal. Never fails.
    pub async fn revoke(&self, principal_id: &str) {
        if let Err(e) = self.store.clear(principal_id).await {
            tracing::warn!("Could not clear credentials for '{}': {}", principal_id, e);
        }
    }

    /// Re-fetch the principal from `/me` and replace the stored snapshot.
    pub async fn reload_principal(&self, principal_id: &str) -> Result<Principal, AuthError> {
        let credentials = self
            .store
            .get(principal_id)
            .await?
            .ok_or(AuthError::Refresh(RefreshError::NoSession))?;

        let principal = self.auth.me(&credentials.tokens.access_token).await?;
        if principal.id != principal_id {
            return Err(AuthError::Decode {
                service: "auth",
                reason: format!("/me returned principal '{}' for '{}'", principal.id, principal_id),
            });
        }

        if !self.store.replace_principal(principal_id, principal.clone()).await? {
            return Err(AuthError::Refresh(RefreshError::NoSession));
        }
        Ok(principal)
    }

    /// The cookie with `last_activity_at` moved to now, or `None` while the
    /// previous touch is still within the coalescing interval.
    pub fn touched(&self, cookie: &SessionCookie) -> Option<SessionCookie> {
        let now = self.clock.now_millis();
        self.policy.touch_due(cookie, now).then(|| SessionCookie {
            last_activity_at: now,
            ..cookie.clone()
        })
    }
}

async fn perform_refresh(
    store: &dyn TokenStore,
    auth: &AuthApi,
    clock: &dyn Clock,
    principal_id: &str,
) -> RefreshOutcome {
    let credentials = store
        .get(principal_id)
        .await
        .map_err(|e| RefreshError::Store(e.to_string()))?
        .ok_or(RefreshError::NoSession)?;

    let now = clock.now_secs();
    let current = &credentials.tokens;

    if !current.is_consistent() {
        return Err(RefreshError::Expired);
    }
    // Another request may have renewed the pair while this one was queued
    if !current.access_expired(now) {
        return Ok(current.clone());
    }
    if current.refresh_expired(now) {
        return Err(RefreshError::Expired);
    }

    let renewed = match auth.refresh(&current.refresh_token).await {
        Ok(tokens) => tokens,
        Err(AuthError::Timeout(service)) => {
            return Err(RefreshError::Unavailable(format!("{} service timed out", service)))
        }
        Err(e @ AuthError::Transport { .. }) => return Err(RefreshError::Unavailable(e.to_string())),
        Err(e) => {
            tracing::debug!("Auth service refused refresh for '{}': {}", principal_id, e);
            return Err(RefreshError::Rejected);
        }
    };

    if !renewed.is_consistent() || renewed.access_expired(clock.now_secs()) {
        return Err(RefreshError::Rejected);
    }

    let replaced = store
        .replace_tokens(principal_id, renewed.clone())
        .await
        .map_err(|e| RefreshError::Store(e.to_string()))?;
    if !replaced {
        return Err(RefreshError::NoSession);
    }

    tracing::info!("Refreshed access token for '{}'", principal_id);
    Ok(renewed)
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("policy", &self.policy)
            .field("login_path", &self.login_path)
            .finish_non_exhaustive()
    }
}
